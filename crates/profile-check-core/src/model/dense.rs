use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::InferenceModel;
use crate::features::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Linear,
}

impl Activation {
    fn apply(self, value: f32) -> f32 {
        match self {
            Self::Relu => value.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-value).exp()),
            Self::Linear => value,
        }
    }
}

/// Fully connected layer; `weights[out][in]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                let sum: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum();
                self.activation.apply(sum + bias)
            })
            .collect()
    }
}

/// Per-feature z-score parameters applied before the first layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

/// Errors emitted while validating model definitions.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelError {
    #[error("model must contain at least one layer")]
    NoLayers,
    #[error("layer {layer} has {rows} weight rows but {biases} biases")]
    BiasMismatch {
        layer: usize,
        rows: usize,
        biases: usize,
    },
    #[error("layer {layer} row {row} expects {expected} inputs (got {actual})")]
    InputWidth {
        layer: usize,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("output layer must have exactly one unit (got {units})")]
    OutputWidth { units: usize },
    #[error("normalization `{field}` must have {expected} values (got {actual})")]
    NormalizationWidth {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("normalization std for feature {index} must be positive (got {value})")]
    NonPositiveStd { index: usize, value: f32 },
    #[error("model produced a non-finite probability")]
    NonFiniteOutput,
}

/// Feed-forward network exported as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseModel {
    #[serde(default)]
    pub normalization: Option<Normalization>,
    pub layers: Vec<DenseLayer>,
}

impl DenseModel {
    /// Construct a model, validating layer shapes before returning.
    pub fn new(
        normalization: Option<Normalization>,
        layers: Vec<DenseLayer>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            normalization,
            layers,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read model file at {}", path.display()))?;
        let model: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid model definition in {}", path.display()))?;
        model
            .validate()
            .with_context(|| format!("model at {} failed validation", path.display()))?;
        debug!(
            path = %path.display(),
            layers = model.layers.len(),
            normalized = model.normalization.is_some(),
            "loaded dense model"
        );
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(norm) = &self.normalization {
            for (field, values) in [("mean", &norm.mean), ("std", &norm.std)] {
                if values.len() != FEATURE_COUNT {
                    return Err(ModelError::NormalizationWidth {
                        field: field.to_string(),
                        expected: FEATURE_COUNT,
                        actual: values.len(),
                    });
                }
            }
            if let Some((index, value)) = norm
                .std
                .iter()
                .copied()
                .enumerate()
                .find(|(_, value)| !value.is_finite() || *value <= 0.0)
            {
                return Err(ModelError::NonPositiveStd { index, value });
            }
        }

        let Some(last) = self.layers.last() else {
            return Err(ModelError::NoLayers);
        };

        let mut width = FEATURE_COUNT;
        for (layer_idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.bias.len() {
                return Err(ModelError::BiasMismatch {
                    layer: layer_idx,
                    rows: layer.weights.len(),
                    biases: layer.bias.len(),
                });
            }
            for (row_idx, row) in layer.weights.iter().enumerate() {
                if row.len() != width {
                    return Err(ModelError::InputWidth {
                        layer: layer_idx,
                        row: row_idx,
                        expected: width,
                        actual: row.len(),
                    });
                }
            }
            width = layer.weights.len();
        }

        if last.weights.len() != 1 {
            return Err(ModelError::OutputWidth {
                units: last.weights.len(),
            });
        }
        Ok(())
    }

    fn normalize(&self, features: &FeatureVector) -> Vec<f32> {
        match &self.normalization {
            Some(norm) => features
                .as_slice()
                .iter()
                .zip(norm.mean.iter().zip(&norm.std))
                .map(|(x, (mean, std))| (x - mean) / std)
                .collect(),
            None => features.as_slice().to_vec(),
        }
    }
}

impl InferenceModel for DenseModel {
    fn predict(&self, features: &FeatureVector) -> Result<f32> {
        let mut activations = self.normalize(features);
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        let probability = activations.first().copied().unwrap_or(f32::NAN);
        if !probability.is_finite() {
            return Err(ModelError::NonFiniteOutput.into());
        }
        trace!(%probability, "dense model prediction");
        Ok(probability)
    }
}
