use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ReasonCode, SuspicionLevel};

/// Suspicion level and behavior message associated with one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonEntry {
    pub reason: ReasonCode,
    pub suspicion_level: SuspicionLevel,
    pub behavior_message: String,
}

impl ReasonEntry {
    /// Construct a new entry, validating invariants before returning.
    pub fn new(
        reason: impl Into<ReasonCode>,
        suspicion_level: SuspicionLevel,
        behavior_message: impl Into<String>,
    ) -> Result<Self, CatalogValidationError> {
        let entry = Self {
            reason: reason.into(),
            suspicion_level,
            behavior_message: behavior_message.into(),
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        if let ReasonCode::Custom(name) = &self.reason {
            if name.trim().is_empty() {
                return Err(CatalogValidationError::EmptyReason);
            }
        }
        if self.behavior_message.trim().is_empty() {
            return Err(CatalogValidationError::EmptyMessage {
                reason: self.reason.to_string(),
            });
        }
        Ok(())
    }
}

/// Errors emitted while validating catalog entries.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogValidationError {
    #[error("reason code must not be blank")]
    EmptyReason,
    #[error("reason `{reason}` behavior message must not be blank")]
    EmptyMessage { reason: String },
    #[error("duplicate reason `{reason}`")]
    DuplicateReason { reason: String },
}

/// Lookup tables from reason codes to suspicion levels and behavior messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonCatalog {
    entries: HashMap<ReasonCode, ReasonEntry>,
}

impl Default for ReasonCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReasonCatalog {
    /// The tables shipped with the report form.
    pub fn builtin() -> Self {
        use ReasonCode::*;
        use SuspicionLevel::*;

        let table = [
            (SpamMessages, Less, "Suspicious behavior."),
            (LinkSpamming, Abnormal, "Highly Abnormal behavior."),
            (IdentityFraud, HighlySuspicious, "Highly Suspicious behavior."),
            (ContentTheft, HighlySuspicious, "Highly Suspicious behavior."),
            (JobScam, Abnormal, "Suspicious behavior."),
            (FakeNews, Suspicious, "Highly Suspicious behavior."),
            (AdFraud, Abnormal, "Suspicious behavior."),
            (BankAccount, VeryHighlySuspicious, "Very highly suspicious behavior."),
            (Otp, VeryHighlySuspicious, "Very highly suspicious behavior."),
            (Others, Suspicious, "Suspicious behavior."),
        ];

        let entries = table
            .into_iter()
            .map(|(reason, suspicion_level, message)| {
                let entry = ReasonEntry {
                    reason: reason.clone(),
                    suspicion_level,
                    behavior_message: message.to_string(),
                };
                (reason, entry)
            })
            .collect();
        Self { entries }
    }

    /// Insert or replace the entry for `entry.reason`.
    pub fn upsert(&mut self, entry: ReasonEntry) -> Result<(), CatalogValidationError> {
        entry.validate()?;
        self.entries.insert(entry.reason.clone(), entry);
        Ok(())
    }

    pub fn get(&self, reason: &ReasonCode) -> Option<&ReasonEntry> {
        self.entries.get(reason)
    }

    /// Unmapped reasons count as `Normal`.
    pub fn level_for(&self, reason: &ReasonCode) -> SuspicionLevel {
        self.get(reason)
            .map(|entry| entry.suspicion_level)
            .unwrap_or(SuspicionLevel::Normal)
    }

    pub fn message_for(&self, reason: &ReasonCode) -> Option<&str> {
        self.get(reason).map(|entry| entry.behavior_message.as_str())
    }

    /// All entries sorted by reason code.
    pub fn entries(&self) -> Vec<&ReasonEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.reason.cmp(&b.reason));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
