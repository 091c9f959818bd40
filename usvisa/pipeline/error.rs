use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Source export and train/test split.
    DataIngestion,
    /// Schema conformance and drift report.
    DataValidation,
    /// Feature derivation, encoding, scaling, balancing.
    DataTransformation,
    /// Classifier fitting.
    ModelTrainer,
    /// Comparison against the published model.
    ModelEvaluation,
    /// Upload of the accepted model.
    ModelPusher,
    /// Scoring with the published model.
    Prediction,
}

impl Stage {
    /// Snake-case name used in logs, events and artifact directories.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataIngestion => "data_ingestion",
            Self::DataValidation => "data_validation",
            Self::DataTransformation => "data_transformation",
            Self::ModelTrainer => "model_trainer",
            Self::ModelEvaluation => "model_evaluation",
            Self::ModelPusher => "model_pusher",
            Self::Prediction => "prediction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by pipeline stages.
///
/// Validation failures are not errors: they travel as
/// [`DataValidationArtifact`](crate::entity::artifact::DataValidationArtifact)
/// values. `ValidationBlocked` is raised only when a later stage is asked to
/// run on top of a failed validation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transformation invoked with a failed validation artifact. Displays the
    /// validation message verbatim.
    #[error("{message}")]
    ValidationBlocked {
        /// Message recorded by data validation.
        message: String,
    },
    /// Any failure inside a stage, with the originating error kept as source.
    #[error("{stage} stage failed")]
    Stage {
        /// Stage that failed.
        stage: Stage,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },
    /// No hyperparameter candidate reached the expected score.
    #[error("no trained model reached the expected f1 score {expected:.4} (best {best:.4})")]
    NoAcceptableModel {
        /// Best f1 among candidates.
        best: f64,
        /// Configured floor.
        expected: f64,
    },
    /// Label value outside the target mapping.
    #[error("unknown {column} label `{label}`")]
    UnknownLabel {
        /// Label column.
        column: String,
        /// Offending value.
        label: String,
    },
    /// Configuration file could not be read or parsed.
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wraps any error with stage context.
    pub fn stage(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            stage,
            source: source.into(),
        }
    }

    /// Stage the error is attributed to, if any.
    #[must_use]
    pub const fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::ValidationBlocked { .. } => Some(Stage::DataTransformation),
            Self::NoAcceptableModel { .. } => Some(Stage::ModelTrainer),
            Self::UnknownLabel { .. } | Self::Config(_) => None,
        }
    }
}

/// Result alias used across the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Attaches stage context to fallible calls, keeping the cause as `source`.
pub trait StageResultExt<T> {
    /// Maps the error into [`PipelineError::Stage`].
    fn stage(self, stage: Stage) -> PipelineResult<T>;
}

impl<T, E> StageResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn stage(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|err| PipelineError::stage(stage, err))
    }
}
