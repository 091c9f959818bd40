use std::sync::Arc;

use serde_json::json;

use super::data_transformation::add_company_age;
use crate::{
    classifier::metrics::f1_score,
    constants::TARGET_COLUMN,
    entity::{
        artifact::{
            DataIngestionArtifact, EvaluateModelResponse, ModelEvaluationArtifact,
            ModelTrainerArtifact,
        },
        config::ModelEvaluationConfig,
        estimator::TargetValueMapping,
    },
    error::{PipelineResult, Stage, StageResultExt},
    frame::Frame,
    storage::{ModelStore, VisaEstimator},
    telemetry::PipelineTelemetry,
};

const STAGE: Stage = Stage::ModelEvaluation;

/// Acceptance rule: an absent base scores 0 and the gain must exceed
/// `min_improvement`.
#[must_use]
pub fn compare_scores(
    trained_model_f1_score: f64,
    base_model_f1_score: Option<f64>,
    min_improvement: f64,
) -> EvaluateModelResponse {
    let difference = trained_model_f1_score - base_model_f1_score.unwrap_or(0.0);
    EvaluateModelResponse {
        trained_model_f1_score,
        base_model_f1_score,
        is_model_accepted: difference > min_improvement,
        difference,
    }
}

/// Scores the published model on the test split and decides acceptance.
pub struct ModelEvaluation {
    ingestion: DataIngestionArtifact,
    trainer: ModelTrainerArtifact,
    config: ModelEvaluationConfig,
    store: Arc<dyn ModelStore>,
    telemetry: PipelineTelemetry,
}

impl std::fmt::Debug for ModelEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEvaluation")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelEvaluation {
    /// Creates the stage.
    pub fn new(
        ingestion: DataIngestionArtifact,
        trainer: ModelTrainerArtifact,
        config: ModelEvaluationConfig,
        store: Arc<dyn ModelStore>,
        telemetry: PipelineTelemetry,
    ) -> Self {
        Self {
            ingestion,
            trainer,
            config,
            store,
            telemetry,
        }
    }

    /// Published model handle, `None` when nothing is published yet.
    pub fn get_best_model(&self) -> PipelineResult<Option<VisaEstimator>> {
        let estimator = VisaEstimator::new(
            Arc::clone(&self.store),
            &self.config.bucket_name,
            &self.config.s3_model_key_path,
        );
        Ok(estimator
            .is_model_present()
            .stage(STAGE)?
            .then_some(estimator))
    }

    /// Compares the trained f1 with the published model's f1 on the test split.
    pub fn evaluate_model(&self) -> PipelineResult<EvaluateModelResponse> {
        let trained = self.trainer.metric_artifact.f1_score;
        let base = match self.get_best_model()? {
            Some(estimator) => {
                let mut test = Frame::read_csv(&self.ingestion.test_file_path).stage(STAGE)?;
                add_company_age(&mut test, self.config.current_year).stage(STAGE)?;
                let labels = test.remove_column(TARGET_COLUMN).stage(STAGE)?.labels();
                let y = TargetValueMapping::encode_labels(&labels).stage(STAGE)?;
                let y_hat = estimator.predict(&test).stage(STAGE)?;
                Some(f1_score(&y, &y_hat).stage(STAGE)?)
            }
            None => None,
        };
        let response = compare_scores(trained, base, self.config.changed_threshold_score);
        self.telemetry.info(STAGE, "evaluated trained model", json!(response));
        Ok(response)
    }

    /// Runs the stage.
    pub fn initiate_model_evaluation(&self) -> PipelineResult<ModelEvaluationArtifact> {
        let response = self.evaluate_model()?;
        Ok(ModelEvaluationArtifact {
            is_model_accepted: response.is_model_accepted,
            changed_accuracy: response.difference,
            s3_model_path: self.config.s3_model_key_path.clone(),
            trained_model_path: self.trainer.trained_model_file_path.clone(),
        })
    }
}
