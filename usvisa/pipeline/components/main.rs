//! Pipeline stages. Each stage takes its configuration plus the artifacts of
//! earlier stages and returns its own artifact.

/// Source export and deterministic train/test split.
pub mod data_ingestion;
/// Feature derivation, encoding, scaling and class balancing.
pub mod data_transformation;
/// Schema checks and drift report.
pub mod data_validation;
/// Two-sample drift statistics.
pub mod drift;
/// Comparison against the published model.
pub mod model_evaluation;
/// Upload of an accepted model.
pub mod model_pusher;
/// Hyperparameter search and model bundling.
pub mod model_trainer;

pub use data_ingestion::DataIngestion;
pub use data_transformation::DataTransformation;
pub use data_validation::DataValidation;
pub use model_evaluation::ModelEvaluation;
pub use model_pusher::ModelPusher;
pub use model_trainer::ModelTrainer;
