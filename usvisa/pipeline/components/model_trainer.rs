use serde_json::json;

use crate::{
    classifier::ModelFactory,
    entity::{
        artifact::{DataTransformationArtifact, ModelTrainerArtifact},
        config::ModelTrainerConfig,
        estimator::VisaModel,
    },
    error::{PipelineError, PipelineResult, Stage, StageResultExt},
    preprocessing::FittedPreprocessor,
    telemetry::PipelineTelemetry,
    utils::{load_array, save_object, split_features_labels},
};

const STAGE: Stage = Stage::ModelTrainer;

/// Grid-searches the classifier and writes the model bundle.
#[derive(Debug)]
pub struct ModelTrainer {
    transformation: DataTransformationArtifact,
    config: ModelTrainerConfig,
    telemetry: PipelineTelemetry,
}

impl ModelTrainer {
    /// Creates the stage.
    #[must_use]
    pub const fn new(
        transformation: DataTransformationArtifact,
        config: ModelTrainerConfig,
        telemetry: PipelineTelemetry,
    ) -> Self {
        Self {
            transformation,
            config,
            telemetry,
        }
    }

    /// Runs the stage. Fails when no candidate reaches the expected f1.
    pub fn initiate_model_trainer(&self) -> PipelineResult<ModelTrainerArtifact> {
        let train = load_array(&self.transformation.transformed_train_file_path).stage(STAGE)?;
        let test = load_array(&self.transformation.transformed_test_file_path).stage(STAGE)?;
        let (x_train, y_train) = split_features_labels(&train).stage(STAGE)?;
        let (x_test, y_test) = split_features_labels(&test).stage(STAGE)?;

        let factory = ModelFactory::new(self.config.candidates.clone());
        let best = factory
            .best_model(&x_train, &y_train, &x_test, &y_test)
            .stage(STAGE)?;
        self.telemetry.info(
            STAGE,
            "selected best candidate",
            json!({
                "params": best.model.params(),
                "f1_score": best.metrics.f1_score,
                "candidates": factory.candidates().len(),
            }),
        );
        if best.metrics.f1_score < self.config.expected_accuracy {
            return Err(PipelineError::NoAcceptableModel {
                best: best.metrics.f1_score,
                expected: self.config.expected_accuracy,
            });
        }

        let preprocessor =
            FittedPreprocessor::load(&self.transformation.transformed_object_file_path)
                .stage(STAGE)?;
        let model = VisaModel::new(preprocessor, best.model);
        save_object(&self.config.trained_model_file_path, &model).stage(STAGE)?;

        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            metric_artifact: best.metrics,
        })
    }
}
