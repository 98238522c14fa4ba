mod dense;

use anyhow::Result;

use crate::features::FeatureVector;

pub use dense::{Activation, DenseLayer, DenseModel, ModelError, Normalization};

/// Pre-trained classifier mapping profile features to a fake-account probability.
///
/// Implementations are loaded once and shared read-only across requests.
pub trait InferenceModel: Send + Sync {
    /// Probability in `0.0..=1.0` that the account is fake.
    fn predict(&self, features: &FeatureVector) -> Result<f32>;
}

/// Model that ignores its input and returns a fixed probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantModel(pub f32);

impl InferenceModel for ConstantModel {
    fn predict(&self, _features: &FeatureVector) -> Result<f32> {
        Ok(self.0)
    }
}
