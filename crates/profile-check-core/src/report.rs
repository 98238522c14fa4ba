use std::fmt::Write;

use serde::Serialize;

use crate::{
    assessment::{PredictionRecord, ProfileAssessment},
    classifier::{Prediction, ReasonMessage, SuspicionLevel, SuspicionResult, VolumeBand},
};

const NOT_AVAILABLE: &str = "n/a";

/// Format styles supported by the default renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Render a bare classification result.
pub fn render_result(result: &SuspicionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => {
            let mut out = String::new();
            write_result(&mut out, result)?;
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// Render a full profile assessment.
pub fn render_assessment(
    assessment: &ProfileAssessment,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_assessment_human(assessment),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonAssessment::from(
            assessment,
        ))?),
    }
}

pub fn render_record(record: &PredictionRecord) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

fn write_result(out: &mut String, result: &SuspicionResult) -> std::fmt::Result {
    writeln!(
        out,
        "Prediction: {} (confidence {:.1}%)",
        result.prediction_label, result.confidence_percentage
    )?;
    let level = result
        .suspicion_level
        .map(|level| level.as_str())
        .unwrap_or(NOT_AVAILABLE);
    writeln!(out, "Suspicion Level: {level}")?;
    writeln!(out, "Behavior: {}", sanitize_line(&result.behavior_message))
}

fn render_assessment_human(assessment: &ProfileAssessment) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Username: {}", assessment.username)?;
    write_result(&mut out, &assessment.result)?;
    writeln!(out, "{}", assessment.report_volume.summary())?;
    writeln!(out)?;

    if assessment.reason_messages.is_empty() {
        writeln!(out, "No catalogued reasons selected.")?;
    } else {
        writeln!(out, "Reasons:")?;
        for entry in &assessment.reason_messages {
            writeln!(
                out,
                "  - {reason:<14} {message}",
                reason = entry.reason.as_str(),
                message = entry.message
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Features:")?;
    for (name, value) in assessment.features.named() {
        writeln!(out, "  - {name:>20}: {value}")?;
    }
    writeln!(out, "\nModel probability: {:.4}", assessment.model_probability)?;
    Ok(out)
}

fn sanitize_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct JsonAssessment<'a> {
    username: &'a str,
    prediction_label: Prediction,
    confidence_percentage: f32,
    suspicion_level: Option<SuspicionLevel>,
    behavior_message: &'a str,
    model_probability: f32,
    volume_band: VolumeBand,
    volume_summary: &'a str,
    selections: usize,
    reason_messages: &'a [ReasonMessage],
    features: Vec<JsonFeature>,
}

#[derive(Debug, Serialize)]
struct JsonFeature {
    name: &'static str,
    value: f32,
}

impl<'a> From<&'a ProfileAssessment> for JsonAssessment<'a> {
    fn from(assessment: &'a ProfileAssessment) -> Self {
        Self {
            username: &assessment.username,
            prediction_label: assessment.result.prediction_label,
            confidence_percentage: assessment.result.confidence_percentage,
            suspicion_level: assessment.result.suspicion_level,
            behavior_message: &assessment.result.behavior_message,
            model_probability: assessment.model_probability,
            volume_band: assessment.report_volume.band,
            volume_summary: assessment.report_volume.summary(),
            selections: assessment.report_volume.selections,
            reason_messages: &assessment.reason_messages,
            features: assessment
                .features
                .named()
                .map(|(name, value)| JsonFeature { name, value })
                .collect(),
        }
    }
}
