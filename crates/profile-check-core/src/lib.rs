pub mod assessment;
pub mod classifier;
pub mod features;
pub mod model;
pub mod profile;
pub mod report;

pub use assessment::{
    AssessmentOutcome, AssessmentRequest, Assessor, PredictionRecord, ProfileAssessment,
};
pub use classifier::{
    classify, confidence_percentage, file_catalog::FileCatalogRepository, BuiltinCatalog,
    CatalogRepository, CatalogValidationError, ClassifierConfig, Prediction, ReasonCatalog,
    ReasonCode, ReasonEntry, ReasonMessage, ReportVolume, SuspicionClassifier, SuspicionLevel,
    SuspicionResult, VolumeBand,
};
pub use features::{normalize_username, FeatureVector, ProfileStats, UsernameError};
pub use model::{ConstantModel, DenseModel, InferenceModel, ModelError};
pub use profile::{ProfileSource, SnapshotProfileSource, StaticProfileSource};
