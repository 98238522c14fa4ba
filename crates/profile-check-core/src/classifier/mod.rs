use std::{convert::Infallible, fmt, str::FromStr};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod file_catalog;

pub use catalog::{CatalogValidationError, ReasonCatalog, ReasonEntry};

/// Message used when neither free text nor a mapped reason describes the behavior.
pub const DEFAULT_BEHAVIOR: &str = "Suspicious behavior.";

const VOLUME_ELEVATED_SUMMARY: &str =
    "Behavioral Analysis: The user exhibits suspicious behavior.";
const VOLUME_NORMAL_SUMMARY: &str = "Behavioral Analysis: The user's behavior seems normal.";

static DEFAULT_CLASSIFIER: Lazy<SuspicionClassifier> = Lazy::new(SuspicionClassifier::default);

/// Reason a reporter gave for flagging an account.
///
/// The ten well-known codes use the exact spellings submitted by the report form.
/// Anything else parses to [`ReasonCode::Custom`] so callers never have to reject input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasonCode {
    SpamMessages,
    LinkSpamming,
    IdentityFraud,
    ContentTheft,
    JobScam,
    FakeNews,
    AdFraud,
    BankAccount,
    Otp,
    Others,
    Custom(String),
}

impl ReasonCode {
    /// The closed set of codes offered by the report form, in form order.
    pub const KNOWN: [ReasonCode; 10] = [
        ReasonCode::SpamMessages,
        ReasonCode::LinkSpamming,
        ReasonCode::IdentityFraud,
        ReasonCode::ContentTheft,
        ReasonCode::JobScam,
        ReasonCode::FakeNews,
        ReasonCode::AdFraud,
        ReasonCode::BankAccount,
        ReasonCode::Otp,
        ReasonCode::Others,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::SpamMessages => "spamMessages",
            Self::LinkSpamming => "linkSpamming",
            Self::IdentityFraud => "identityFraud",
            Self::ContentTheft => "contenttheft",
            Self::JobScam => "jobscam",
            Self::FakeNews => "fakenews",
            Self::AdFraud => "adfraud",
            Self::BankAccount => "bankAccount",
            Self::Otp => "otp",
            Self::Others => "others",
            Self::Custom(name) => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl From<&str> for ReasonCode {
    fn from(value: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|code| code.as_str() == value)
            .cloned()
            .unwrap_or_else(|| Self::Custom(value.to_string()))
    }
}

impl From<String> for ReasonCode {
    fn from(value: String) -> Self {
        match Self::from(value.as_str()) {
            Self::Custom(_) => Self::Custom(value),
            known => known,
        }
    }
}

impl From<ReasonCode> for String {
    fn from(code: ReasonCode) -> Self {
        match code {
            ReasonCode::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for ReasonCode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative suspicion buckets assigned to reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuspicionLevel {
    Less,
    Normal,
    Abnormal,
    Suspicious,
    #[serde(rename = "Highly Suspicious")]
    HighlySuspicious,
    #[serde(rename = "Very Highly Suspicious")]
    VeryHighlySuspicious,
}

impl SuspicionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Less => "Less",
            Self::Normal => "Normal",
            Self::Abnormal => "Abnormal",
            Self::Suspicious => "Suspicious",
            Self::HighlySuspicious => "Highly Suspicious",
            Self::VeryHighlySuspicious => "Very Highly Suspicious",
        }
    }
}

impl fmt::Display for SuspicionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary verdict derived from the model probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    Fake,
    Real,
}

impl Prediction {
    pub fn from_probability_with_threshold(probability: f32, threshold: f32) -> Self {
        if probability >= threshold {
            Self::Fake
        } else {
            Self::Real
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fake => "Fake",
            Self::Real => "Real",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionResult {
    pub prediction_label: Prediction,
    /// `(1 - probability) * 100`, not clamped.
    pub confidence_percentage: f32,
    /// `None` when no reasons were selected.
    pub suspicion_level: Option<SuspicionLevel>,
    pub behavior_message: String,
}

/// Catalog message attached to one selected reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonMessage {
    pub reason: ReasonCode,
    pub message: String,
}

/// Whether a report carried an unusually high number of selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeBand {
    Normal,
    Elevated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVolume {
    /// Selected reasons plus one when free text was supplied.
    pub selections: usize,
    pub band: VolumeBand,
}

impl ReportVolume {
    pub fn summary(&self) -> &'static str {
        match self.band {
            VolumeBand::Elevated => VOLUME_ELEVATED_SUMMARY,
            VolumeBand::Normal => VOLUME_NORMAL_SUMMARY,
        }
    }
}

/// Tunable knobs for the classification heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Probabilities at or above this value are labelled fake.
    pub fake_threshold: f32,
    /// Reports with more selections than this are flagged as elevated volume.
    pub volume_threshold: usize,
    pub default_behavior: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            fake_threshold: 0.5,
            volume_threshold: 5,
            default_behavior: DEFAULT_BEHAVIOR.to_string(),
        }
    }
}

/// Combines a model probability with reporter-selected reasons.
#[derive(Debug, Clone, Default)]
pub struct SuspicionClassifier {
    catalog: ReasonCatalog,
    config: ClassifierConfig,
}

impl SuspicionClassifier {
    pub fn new(catalog: ReasonCatalog) -> Self {
        Self::with_config(catalog, ClassifierConfig::default())
    }

    pub fn with_config(catalog: ReasonCatalog, config: ClassifierConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &ReasonCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one report. Total over its inputs: unmapped reasons and
    /// out-of-range probabilities fall back to defaults instead of failing.
    pub fn classify(
        &self,
        model_probability: f32,
        selected_reasons: &[ReasonCode],
        other_text: Option<&str>,
    ) -> SuspicionResult {
        SuspicionResult {
            prediction_label: Prediction::from_probability_with_threshold(
                model_probability,
                self.config.fake_threshold,
            ),
            confidence_percentage: confidence_percentage(model_probability),
            suspicion_level: self.suspicion_level(selected_reasons),
            behavior_message: self.behavior_message(selected_reasons, other_text),
        }
    }

    /// Most frequent mapped level; ties go to the level seen first.
    pub fn suspicion_level(&self, selected_reasons: &[ReasonCode]) -> Option<SuspicionLevel> {
        let mut tally: Vec<(SuspicionLevel, usize)> = Vec::new();
        for reason in selected_reasons {
            let level = self.catalog.level_for(reason);
            match tally.iter_mut().find(|(seen, _)| *seen == level) {
                Some((_, count)) => *count += 1,
                None => tally.push((level, 1)),
            }
        }

        let mut best: Option<(SuspicionLevel, usize)> = None;
        for (level, count) in tally {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((level, count));
            }
        }
        best.map(|(level, _)| level)
    }

    pub fn behavior_message(
        &self,
        selected_reasons: &[ReasonCode],
        other_text: Option<&str>,
    ) -> String {
        if let Some(text) = other_text.filter(|text| !text.is_empty()) {
            return text.to_string();
        }
        selected_reasons
            .first()
            .and_then(|reason| self.catalog.message_for(reason))
            .unwrap_or(self.config.default_behavior.as_str())
            .to_string()
    }

    /// One message per distinct mapped reason, in first-selection order.
    pub fn reason_messages(&self, selected_reasons: &[ReasonCode]) -> Vec<ReasonMessage> {
        let mut messages: Vec<ReasonMessage> = Vec::new();
        for reason in selected_reasons {
            if messages.iter().any(|entry| &entry.reason == reason) {
                continue;
            }
            if let Some(message) = self.catalog.message_for(reason) {
                messages.push(ReasonMessage {
                    reason: reason.clone(),
                    message: message.to_string(),
                });
            }
        }
        messages
    }

    pub fn assess_report_volume(
        &self,
        selected_reasons: &[ReasonCode],
        other_text: Option<&str>,
    ) -> ReportVolume {
        let has_other = other_text.is_some_and(|text| !text.is_empty());
        let selections = selected_reasons.len() + usize::from(has_other);
        let band = if selections > self.config.volume_threshold {
            VolumeBand::Elevated
        } else {
            VolumeBand::Normal
        };
        ReportVolume { selections, band }
    }
}

/// Abstraction over catalog loading so built-in and file-backed tables can be swapped.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Retrieve the catalog currently active.
    async fn load_catalog(&self) -> AnyResult<ReasonCatalog>;
}

/// Repository serving the tables shipped with the report form.
#[derive(Debug, Default, Clone)]
pub struct BuiltinCatalog;

#[async_trait]
impl CatalogRepository for BuiltinCatalog {
    async fn load_catalog(&self) -> AnyResult<ReasonCatalog> {
        Ok(ReasonCatalog::builtin())
    }
}

/// Share of confidence that the account is real, as a percentage.
pub fn confidence_percentage(model_probability: f32) -> f32 {
    (1.0 - model_probability) * 100.0
}

/// Classify using the built-in reason catalog and default configuration.
pub fn classify(
    model_probability: f32,
    selected_reasons: &[ReasonCode],
    other_text: Option<&str>,
) -> SuspicionResult {
    DEFAULT_CLASSIFIER.classify(model_probability, selected_reasons, other_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reasons(codes: &[&str]) -> Vec<ReasonCode> {
        codes.iter().map(|code| ReasonCode::from(*code)).collect()
    }

    #[test]
    fn otp_report_on_real_account() {
        let result = classify(0.2, &reasons(&["otp"]), None);
        assert_eq!(result.prediction_label, Prediction::Real);
        assert!((result.confidence_percentage - 80.0).abs() < 1e-4);
        assert_eq!(result.behavior_message, "Very highly suspicious behavior.");
        assert_eq!(
            result.suspicion_level,
            Some(SuspicionLevel::VeryHighlySuspicious)
        );
    }

    #[test]
    fn suspicion_level_is_the_mode() {
        let result = classify(0.9, &reasons(&["spamMessages", "otp", "otp"]), None);
        assert_eq!(result.prediction_label, Prediction::Fake);
        assert_eq!(
            result.suspicion_level,
            Some(SuspicionLevel::VeryHighlySuspicious)
        );
        assert_eq!(result.behavior_message, "Suspicious behavior.");
    }

    #[test]
    fn ties_go_to_first_encountered_level() {
        let result = classify(0.6, &reasons(&["fakenews", "jobscam", "adfraud", "others"]), None);
        // Suspicious x2 (fakenews, others) vs Abnormal x2 (jobscam, adfraud).
        assert_eq!(result.suspicion_level, Some(SuspicionLevel::Suspicious));

        let result = classify(0.6, &reasons(&["jobscam", "fakenews"]), None);
        assert_eq!(result.suspicion_level, Some(SuspicionLevel::Abnormal));
    }

    #[test]
    fn other_text_is_passed_through_verbatim() {
        let result = classify(0.7, &[], Some("Sent me a phishing link"));
        assert_eq!(result.behavior_message, "Sent me a phishing link");
        assert_eq!(result.suspicion_level, None);

        let result = classify(0.7, &reasons(&["otp"]), Some("  keeps asking for codes "));
        assert_eq!(result.behavior_message, "  keeps asking for codes ");
    }

    #[test]
    fn empty_report_falls_back_to_defaults() {
        let result = classify(0.1, &[], None);
        assert_eq!(result.behavior_message, DEFAULT_BEHAVIOR);
        assert_eq!(result.suspicion_level, None);
        assert_eq!(result.prediction_label, Prediction::Real);

        let empty = classify(0.1, &[], Some(""));
        assert_eq!(empty.behavior_message, DEFAULT_BEHAVIOR);
    }

    #[test]
    fn whitespace_other_text_counts_as_supplied() {
        let result = classify(0.7, &reasons(&["otp"]), Some("   "));
        assert_eq!(result.behavior_message, "   ");

        let classifier = SuspicionClassifier::default();
        let volume = classifier.assess_report_volume(&reasons(&["otp"; 5]), Some(" "));
        assert_eq!(volume.selections, 6);
        assert_eq!(volume.band, VolumeBand::Elevated);

        let volume = classifier.assess_report_volume(&reasons(&["otp"; 5]), Some(""));
        assert_eq!(volume.selections, 5);
        assert_eq!(volume.band, VolumeBand::Normal);
    }

    #[test]
    fn unmapped_reasons_degrade_gracefully() {
        let result = classify(0.4, &reasons(&["catfishing", "catfishing", "otp"]), None);
        assert_eq!(result.suspicion_level, Some(SuspicionLevel::Normal));
        assert_eq!(result.behavior_message, DEFAULT_BEHAVIOR);
    }

    #[test]
    fn out_of_range_probability_is_not_clamped() {
        let result = classify(1.5, &[], None);
        assert_eq!(result.prediction_label, Prediction::Fake);
        assert!((result.confidence_percentage + 50.0).abs() < 1e-4);
    }

    #[test]
    fn reason_codes_round_trip_through_wire_names() {
        for code in ReasonCode::KNOWN {
            assert_eq!(ReasonCode::from(code.as_str()), code);
            assert!(!code.is_custom());
        }
        let custom: ReasonCode = "impersonation".parse().unwrap();
        assert_eq!(custom, ReasonCode::Custom("impersonation".into()));

        let parsed: Vec<ReasonCode> =
            serde_json::from_str(r#"["bankAccount", "contenttheft", "doxxing"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                ReasonCode::BankAccount,
                ReasonCode::ContentTheft,
                ReasonCode::Custom("doxxing".into())
            ]
        );
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"["bankAccount","contenttheft","doxxing"]"#
        );
    }

    #[test]
    fn suspicion_level_serializes_with_spaces() {
        let json = serde_json::to_string(&SuspicionLevel::HighlySuspicious).unwrap();
        assert_eq!(json, r#""Highly Suspicious""#);
        assert_eq!(
            SuspicionLevel::VeryHighlySuspicious.to_string(),
            "Very Highly Suspicious"
        );
    }

    #[test]
    fn reason_messages_are_distinct_and_ordered() {
        let classifier = SuspicionClassifier::default();
        let messages =
            classifier.reason_messages(&reasons(&["otp", "linkSpamming", "otp", "mystery"]));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].reason, ReasonCode::Otp);
        assert_eq!(messages[1].reason, ReasonCode::LinkSpamming);
        assert_eq!(messages[1].message, "Highly Abnormal behavior.");
    }

    #[test]
    fn report_volume_counts_other_text() {
        let classifier = SuspicionClassifier::default();
        let five = reasons(&["otp", "adfraud", "jobscam", "fakenews", "others"]);

        let volume = classifier.assess_report_volume(&five, None);
        assert_eq!(volume.selections, 5);
        assert_eq!(volume.band, VolumeBand::Normal);
        assert_eq!(volume.summary(), VOLUME_NORMAL_SUMMARY);

        let volume = classifier.assess_report_volume(&five, Some("spams my DMs"));
        assert_eq!(volume.selections, 6);
        assert_eq!(volume.band, VolumeBand::Elevated);
        assert_eq!(volume.summary(), VOLUME_ELEVATED_SUMMARY);
    }

    #[test]
    fn custom_threshold_moves_the_label() {
        let classifier = SuspicionClassifier::with_config(
            ReasonCatalog::builtin(),
            ClassifierConfig {
                fake_threshold: 0.8,
                ..ClassifierConfig::default()
            },
        );
        assert_eq!(
            classifier.classify(0.7, &[], None).prediction_label,
            Prediction::Real
        );
        assert_eq!(
            classifier.classify(0.8, &[], None).prediction_label,
            Prediction::Fake
        );
    }

    fn reason_strategy() -> impl Strategy<Value = ReasonCode> {
        prop_oneof![
            proptest::sample::select(ReasonCode::KNOWN.to_vec()),
            "[a-z]{3,12}".prop_map(ReasonCode::from),
        ]
    }

    proptest! {
        #[test]
        fn probabilities_below_half_are_real(p in 0.0f32..0.5f32) {
            prop_assert_eq!(classify(p, &[], None).prediction_label, Prediction::Real);
        }

        #[test]
        fn probabilities_from_half_are_fake(p in 0.5f32..=1.0f32) {
            prop_assert_eq!(classify(p, &[], None).prediction_label, Prediction::Fake);
        }

        #[test]
        fn confidence_matches_formula(p in proptest::num::f32::NORMAL) {
            let result = classify(p, &[], None);
            prop_assert_eq!(result.confidence_percentage.to_bits(), ((1.0 - p) * 100.0).to_bits());
        }

        #[test]
        fn classification_is_idempotent(
            p in 0.0f32..=1.0f32,
            selected in proptest::collection::vec(reason_strategy(), 0..8),
            other in proptest::option::of("[ a-zA-Z]{0,24}"),
        ) {
            let first = classify(p, &selected, other.as_deref());
            let second = classify(p, &selected, other.as_deref());
            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
        }

        #[test]
        fn any_selection_yields_a_level(
            selected in proptest::collection::vec(reason_strategy(), 1..8),
        ) {
            prop_assert!(classify(0.5, &selected, None).suspicion_level.is_some());
        }
    }
}
