use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    classifier::{
        Prediction, ReasonCode, ReasonMessage, ReportVolume, SuspicionClassifier, SuspicionResult,
    },
    features::{normalize_username, FeatureVector},
    model::InferenceModel,
    profile::ProfileSource,
};

/// A report submitted against one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub username: String,
    #[serde(default)]
    pub reasons: Vec<ReasonCode>,
    #[serde(default)]
    pub other: Option<String>,
}

impl AssessmentRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_reasons<I, R>(mut self, reasons: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ReasonCode>,
    {
        self.reasons = reasons.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_other(mut self, other: impl Into<String>) -> Self {
        self.other = Some(other.into());
        self
    }
}

/// Everything derived for one report on an existing account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAssessment {
    pub username: String,
    pub features: FeatureVector,
    pub model_probability: f32,
    pub result: SuspicionResult,
    pub reason_messages: Vec<ReasonMessage>,
    pub report_volume: ReportVolume,
}

impl ProfileAssessment {
    pub fn record(&self) -> PredictionRecord {
        PredictionRecord {
            username: self.username.clone(),
            prediction_label: self.result.prediction_label,
            confidence: self.result.confidence_percentage,
            behavior: self.result.behavior_message.clone(),
        }
    }
}

/// Row shape handed to a storage layer, keyed by username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub username: String,
    pub prediction_label: Prediction,
    pub confidence: f32,
    pub behavior: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Assessed(Box<ProfileAssessment>),
    ProfileNotFound { username: String },
}

/// Wires profile lookup, feature extraction, inference and classification together.
pub struct Assessor {
    profiles: Arc<dyn ProfileSource>,
    model: Arc<dyn InferenceModel>,
    classifier: SuspicionClassifier,
}

impl Assessor {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        model: Arc<dyn InferenceModel>,
        classifier: SuspicionClassifier,
    ) -> Self {
        Self {
            profiles,
            model,
            classifier,
        }
    }

    pub fn classifier(&self) -> &SuspicionClassifier {
        &self.classifier
    }

    #[instrument(
        name = "assess_profile",
        skip(self, request),
        fields(username = %request.username, reasons = request.reasons.len())
    )]
    pub async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentOutcome> {
        let username = normalize_username(&request.username)?;
        let Some(profile) = self
            .profiles
            .fetch(&username)
            .await
            .with_context(|| format!("failed to fetch profile `{username}`"))?
        else {
            info!(%username, "profile not found");
            return Ok(AssessmentOutcome::ProfileNotFound { username });
        };

        let features = profile.feature_vector();
        let model_probability = self
            .model
            .predict(&features)
            .with_context(|| format!("inference failed for `{username}`"))?;
        debug!(%model_probability, ?features, "model prediction");

        let other = request.other.as_deref();
        let result = self
            .classifier
            .classify(model_probability, &request.reasons, other);
        let reason_messages = self.classifier.reason_messages(&request.reasons);
        let report_volume = self
            .classifier
            .assess_report_volume(&request.reasons, other);

        info!(
            %username,
            label = %result.prediction_label,
            confidence = result.confidence_percentage,
            "assessment completed"
        );

        Ok(AssessmentOutcome::Assessed(Box::new(ProfileAssessment {
            username,
            features,
            model_probability,
            result,
            reason_messages,
            report_volume,
        })))
    }
}
