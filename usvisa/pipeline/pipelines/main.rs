//! Entry points composing the stages.

/// Scoring of single applications with the published model.
pub mod prediction_pipeline;
/// Stage orchestration with the acceptance gate.
pub mod training_pipeline;

pub use prediction_pipeline::{VisaClassifier, VisaData};
pub use training_pipeline::{PipelineOutcome, TrainPipeline};
