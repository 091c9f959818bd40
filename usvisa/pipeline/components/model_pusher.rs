use std::sync::Arc;

use serde_json::json;

use crate::{
    entity::{
        artifact::{ModelEvaluationArtifact, ModelPusherArtifact},
        config::ModelPusherConfig,
    },
    error::{PipelineResult, Stage, StageResultExt},
    storage::{ModelStore, VisaEstimator},
    telemetry::PipelineTelemetry,
};

const STAGE: Stage = Stage::ModelPusher;

/// Publishes the accepted model to the model store.
pub struct ModelPusher {
    evaluation: ModelEvaluationArtifact,
    config: ModelPusherConfig,
    estimator: VisaEstimator,
    telemetry: PipelineTelemetry,
}

impl std::fmt::Debug for ModelPusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPusher")
            .field("config", &self.config)
            .field("estimator", &self.estimator)
            .finish_non_exhaustive()
    }
}

impl ModelPusher {
    /// Creates the stage.
    pub fn new(
        evaluation: ModelEvaluationArtifact,
        config: ModelPusherConfig,
        store: Arc<dyn ModelStore>,
        telemetry: PipelineTelemetry,
    ) -> Self {
        let estimator =
            VisaEstimator::new(store, &config.bucket_name, &config.s3_model_key_path);
        Self {
            evaluation,
            config,
            estimator,
            telemetry,
        }
    }

    /// Uploads the trained model, replacing whatever was published.
    pub fn initiate_model_pusher(&self) -> PipelineResult<ModelPusherArtifact> {
        self.estimator
            .save_model(&self.evaluation.trained_model_path)
            .stage(STAGE)?;
        self.telemetry.info(
            STAGE,
            "uploaded model",
            json!({
                "bucket_name": self.config.bucket_name,
                "key": self.config.s3_model_key_path,
                "changed_accuracy": self.evaluation.changed_accuracy,
            }),
        );
        Ok(ModelPusherArtifact {
            bucket_name: self.config.bucket_name.clone(),
            s3_model_path: self.config.s3_model_key_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entity::config::PipelineConfig, storage::MemoryModelStore};
    use tempfile::tempdir;

    #[test]
    fn uploads_trained_file_under_configured_key() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("model.json");
        std::fs::write(&model, br#"{"marker":1}"#).unwrap();
        let store = Arc::new(MemoryModelStore::new());
        let pusher = ModelPusher::new(
            ModelEvaluationArtifact {
                is_model_accepted: true,
                changed_accuracy: 0.2,
                s3_model_path: "model-registry/model.json".into(),
                trained_model_path: model,
            },
            ModelPusherConfig::new(&PipelineConfig::default()),
            store.clone(),
            PipelineTelemetry::disabled("test"),
        );
        let artifact = pusher.initiate_model_pusher().unwrap();
        assert_eq!(artifact.bucket_name, "usvisa-model2024");
        assert_eq!(artifact.s3_model_path, "model-registry/model.json");
        assert_eq!(store.upload_count(), 1);
        let bytes = store
            .get_object("usvisa-model2024", "model-registry/model.json")
            .unwrap();
        assert_eq!(bytes, br#"{"marker":1}"#);
    }

    #[test]
    fn missing_model_file_fails() {
        let dir = tempdir().unwrap();
        let pusher = ModelPusher::new(
            ModelEvaluationArtifact {
                is_model_accepted: true,
                changed_accuracy: 0.2,
                s3_model_path: "model-registry/model.json".into(),
                trained_model_path: dir.path().join("absent.json"),
            },
            ModelPusherConfig::new(&PipelineConfig::default()),
            Arc::new(MemoryModelStore::new()),
            PipelineTelemetry::disabled("test"),
        );
        let err = pusher.initiate_model_pusher().unwrap_err();
        assert_eq!(err.failed_stage(), Some(Stage::ModelPusher));
    }
}
