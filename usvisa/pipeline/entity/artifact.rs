use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationMetrics;

/// Output of data ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    /// Train split CSV.
    pub trained_file_path: PathBuf,
    /// Test split CSV.
    pub test_file_path: PathBuf,
}

/// Output of data validation. A false status is a result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    /// True when every structural check passed.
    pub validation_status: bool,
    /// Concatenated failure descriptions; empty on success.
    pub message: String,
    /// Drift report, written only when structural checks pass.
    pub drift_report_file_path: Option<PathBuf>,
    /// Whether the drift report flagged dataset drift.
    pub drift_detected: bool,
}

/// Output of data transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    /// Serialized fitted preprocessor.
    pub transformed_object_file_path: PathBuf,
    /// `[features | label]` train array.
    pub transformed_train_file_path: PathBuf,
    /// `[features | label]` test array.
    pub transformed_test_file_path: PathBuf,
}

/// Scores of the trained model.
pub type ClassificationMetricArtifact = ClassificationMetrics;

/// Output of the model trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    /// Serialized model bundle.
    pub trained_model_file_path: PathBuf,
    /// Test-split scores of the selected model.
    pub metric_artifact: ClassificationMetricArtifact,
}

/// Comparison of the trained model against the published one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluateModelResponse {
    /// F1 of the newly trained model.
    pub trained_model_f1_score: f64,
    /// F1 of the published model, `None` when nothing is published yet.
    pub base_model_f1_score: Option<f64>,
    /// Acceptance decision.
    pub is_model_accepted: bool,
    /// `trained - base`, with an absent base counted as 0.
    pub difference: f64,
}

/// Output of model evaluation; gates the pusher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    /// Acceptance decision.
    pub is_model_accepted: bool,
    /// Score difference against the published model.
    pub changed_accuracy: f64,
    /// Store key of the published model.
    pub s3_model_path: String,
    /// Local path of the trained model.
    pub trained_model_path: PathBuf,
}

/// Output of the model pusher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPusherArtifact {
    /// Bucket the model was uploaded to.
    pub bucket_name: String,
    /// Key the model was uploaded under.
    pub s3_model_path: String,
}
