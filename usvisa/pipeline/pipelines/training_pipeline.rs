use std::{path::PathBuf, sync::Arc};

use serde::Serialize;
use serde_json::json;
use shared_event_bus::EventKind;
use shared_logging::LogLevel;

use crate::{
    components::{
        DataIngestion, DataTransformation, DataValidation, ModelEvaluation, ModelPusher,
        ModelTrainer,
    },
    entity::{
        artifact::{
            DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
            ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact,
        },
        config::{
            DataIngestionConfig, DataTransformationConfig, DataValidationConfig,
            ModelEvaluationConfig, ModelPusherConfig, ModelTrainerConfig, PipelineConfig,
            TrainingPipelineConfig,
        },
    },
    error::{PipelineResult, Stage},
    storage::ModelStore,
    telemetry::PipelineTelemetry,
};

/// Artifacts of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Run identifier shared with logs and events.
    pub run_id: String,
    /// Timestamped artifact directory of the run.
    pub artifact_dir: PathBuf,
    /// Split files.
    pub data_ingestion: DataIngestionArtifact,
    /// Validation verdict.
    pub data_validation: DataValidationArtifact,
    /// Transformed arrays and preprocessor.
    pub data_transformation: DataTransformationArtifact,
    /// Trained model bundle and metrics.
    pub model_trainer: ModelTrainerArtifact,
    /// Acceptance decision.
    pub model_evaluation: ModelEvaluationArtifact,
    /// Present only when the model was accepted and uploaded.
    pub model_pusher: Option<ModelPusherArtifact>,
}

/// Linear training pipeline: ingestion, validation, transformation,
/// training, evaluation and, when accepted, publishing.
pub struct TrainPipeline {
    settings: PipelineConfig,
    run: TrainingPipelineConfig,
    store: Arc<dyn ModelStore>,
    telemetry: PipelineTelemetry,
}

impl std::fmt::Debug for TrainPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainPipeline")
            .field("run", &self.run)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl TrainPipeline {
    /// Creates a pipeline whose artifact directory is stamped with the
    /// current local time.
    pub fn new(
        settings: PipelineConfig,
        store: Arc<dyn ModelStore>,
        telemetry: PipelineTelemetry,
    ) -> Self {
        let run = TrainingPipelineConfig::now(&settings.artifact_root);
        Self::with_run(settings, run, store, telemetry)
    }

    /// Creates a pipeline writing into an explicit run directory.
    pub fn with_run(
        settings: PipelineConfig,
        run: TrainingPipelineConfig,
        store: Arc<dyn ModelStore>,
        telemetry: PipelineTelemetry,
    ) -> Self {
        Self {
            settings,
            run,
            store,
            telemetry,
        }
    }

    /// Run-level configuration.
    #[must_use]
    pub const fn training_pipeline_config(&self) -> &TrainingPipelineConfig {
        &self.run
    }

    fn run_stage<T, F>(&self, stage: Stage, body: F) -> PipelineResult<T>
    where
        T: Serialize,
        F: FnOnce() -> PipelineResult<T>,
    {
        self.telemetry.notify(EventKind::StageStarted, Some(stage), json!({}));
        match body() {
            Ok(artifact) => {
                self.telemetry.notify(EventKind::StageCompleted, Some(stage), json!(artifact));
                Ok(artifact)
            }
            Err(err) => {
                let payload = json!({ "error": err.to_string() });
                self.telemetry
                    .record(LogLevel::Error, Some(stage), "stage failed", payload.clone());
                self.telemetry.notify(EventKind::StageFailed, Some(stage), payload);
                Err(err)
            }
        }
    }

    /// Exports the source data and splits it.
    pub fn start_data_ingestion(&self) -> PipelineResult<DataIngestionArtifact> {
        self.run_stage(Stage::DataIngestion, || {
            let config = DataIngestionConfig::new(&self.run, &self.settings);
            DataIngestion::new(config, self.telemetry.clone()).initiate_data_ingestion()
        })
    }

    /// Checks the splits against the schema.
    pub fn start_data_validation(
        &self,
        ingestion: &DataIngestionArtifact,
    ) -> PipelineResult<DataValidationArtifact> {
        self.run_stage(Stage::DataValidation, || {
            let config = DataValidationConfig::new(&self.run, &self.settings);
            DataValidation::new(ingestion.clone(), config, self.telemetry.clone())?
                .initiate_data_validation()
        })
    }

    /// Builds the training arrays; errors when validation failed.
    pub fn start_data_transformation(
        &self,
        ingestion: &DataIngestionArtifact,
        validation: &DataValidationArtifact,
    ) -> PipelineResult<DataTransformationArtifact> {
        self.run_stage(Stage::DataTransformation, || {
            let config = DataTransformationConfig::new(&self.run, &self.settings);
            DataTransformation::new(
                ingestion.clone(),
                validation.clone(),
                config,
                self.telemetry.clone(),
            )
            .initiate_data_transformation()
        })
    }

    /// Trains and bundles the model.
    pub fn start_model_trainer(
        &self,
        transformation: &DataTransformationArtifact,
    ) -> PipelineResult<ModelTrainerArtifact> {
        self.run_stage(Stage::ModelTrainer, || {
            let config = ModelTrainerConfig::new(&self.run, &self.settings);
            ModelTrainer::new(transformation.clone(), config, self.telemetry.clone())
                .initiate_model_trainer()
        })
    }

    /// Compares the trained model with the published one.
    pub fn start_model_evaluation(
        &self,
        ingestion: &DataIngestionArtifact,
        trainer: &ModelTrainerArtifact,
    ) -> PipelineResult<ModelEvaluationArtifact> {
        self.run_stage(Stage::ModelEvaluation, || {
            ModelEvaluation::new(
                ingestion.clone(),
                trainer.clone(),
                ModelEvaluationConfig::new(&self.settings),
                Arc::clone(&self.store),
                self.telemetry.clone(),
            )
            .initiate_model_evaluation()
        })
    }

    /// Uploads the model. Only called for accepted models.
    pub fn start_model_pusher(
        &self,
        evaluation: &ModelEvaluationArtifact,
    ) -> PipelineResult<ModelPusherArtifact> {
        self.run_stage(Stage::ModelPusher, || {
            ModelPusher::new(
                evaluation.clone(),
                ModelPusherConfig::new(&self.settings),
                Arc::clone(&self.store),
                self.telemetry.clone(),
            )
            .initiate_model_pusher()
        })
    }

    /// Runs every stage in order. The pusher runs only when the evaluation
    /// accepted the trained model.
    pub fn run_pipeline(&self) -> PipelineResult<PipelineOutcome> {
        let data_ingestion = self.start_data_ingestion()?;
        let data_validation = self.start_data_validation(&data_ingestion)?;
        let data_transformation =
            self.start_data_transformation(&data_ingestion, &data_validation)?;
        let model_trainer = self.start_model_trainer(&data_transformation)?;
        let model_evaluation = self.start_model_evaluation(&data_ingestion, &model_trainer)?;

        let decision = json!({
            "f1_score": model_trainer.metric_artifact.f1_score,
            "changed_accuracy": model_evaluation.changed_accuracy,
        });
        let model_pusher = if model_evaluation.is_model_accepted {
            self.telemetry.notify(EventKind::ModelAccepted, Some(Stage::ModelEvaluation), decision);
            let pushed = self.start_model_pusher(&model_evaluation)?;
            self.telemetry
                .notify(EventKind::ModelPublished, Some(Stage::ModelPusher), json!(pushed));
            Some(pushed)
        } else {
            self.telemetry.notify(EventKind::ModelRejected, Some(Stage::ModelEvaluation), decision);
            self.telemetry.info(
                Stage::ModelEvaluation,
                "trained model is not better than the published model",
                json!({ "changed_accuracy": model_evaluation.changed_accuracy }),
            );
            None
        };

        Ok(PipelineOutcome {
            run_id: self.telemetry.run_id().to_string(),
            artifact_dir: self.run.artifact_dir.clone(),
            data_ingestion,
            data_validation,
            data_transformation,
            model_trainer,
            model_evaluation,
            model_pusher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::data_ingestion::train_test_split,
        error::PipelineError,
        frame::Frame,
        resampling::balance_ratio,
        sample::synthetic_visa_frame,
        storage::MemoryModelStore,
        utils::{load_array, split_features_labels},
    };
    use async_trait::async_trait;
    use chrono::{Local, TimeZone};
    use shared_event_bus::{EventPublisher, MemoryEventBus, PipelineEvent};
    use std::path::Path;
    use tempfile::tempdir;

    const SCHEMA: &str = r"
columns:
  - continent: category
  - education_of_employee: category
  - has_job_experience: category
  - no_of_employees: int
  - yr_of_estab: int
  - region_of_employment: category
  - prevailing_wage: float
  - unit_of_wage: category
  - full_time_position: category
  - case_status: category
numerical_columns: [no_of_employees, yr_of_estab, prevailing_wage]
categorical_columns:
  - continent
  - education_of_employee
  - has_job_experience
  - region_of_employment
  - unit_of_wage
  - full_time_position
  - case_status
drop_columns: [yr_of_estab]
oh_columns: [continent, unit_of_wage, region_of_employment]
or_columns: [has_job_experience, full_time_position, education_of_employee]
transform_columns: [no_of_employees, company_age]
num_features: [prevailing_wage]
";

    fn settings(dir: &Path) -> PipelineConfig {
        let source = dir.join("usvisa.csv");
        synthetic_visa_frame(300, 7)
            .unwrap()
            .drop_columns(&["case_id", "requires_job_training"])
            .unwrap()
            .write_csv(&source)
            .unwrap();
        let schema = dir.join("schema.yaml");
        std::fs::write(&schema, SCHEMA).unwrap();

        let mut settings = PipelineConfig::default();
        settings.artifact_root = dir.join("artifact");
        settings.data_ingestion.source_file = source;
        settings.data_validation.schema_file = schema;
        settings.data_transformation.current_year = Some(2024);
        settings.model_trainer.expected_accuracy = 0.0;
        settings
    }

    fn pipeline(
        settings: PipelineConfig,
        store: Arc<MemoryModelStore>,
        bus: Arc<dyn EventPublisher>,
    ) -> TrainPipeline {
        let run = TrainingPipelineConfig::new(
            &settings.artifact_root,
            Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        );
        let telemetry = PipelineTelemetry::builder("usvisa")
            .event_publisher(bus)
            .build()
            .unwrap();
        TrainPipeline::with_run(settings, run, store, telemetry)
    }

    #[test]
    fn end_to_end_run_balances_and_gates_publishing() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryModelStore::new());
        let bus = Arc::new(MemoryEventBus::new(64));
        let outcome = pipeline(settings(dir.path()), store.clone(), bus.clone())
            .run_pipeline()
            .unwrap();

        assert!(outcome.artifact_dir.ends_with("05_01_2024_12_00_00"));
        let source = Frame::read_csv(dir.path().join("usvisa.csv")).unwrap();
        let (train_idx, test_idx) = train_test_split(300, 0.2, 42);
        let train = Frame::read_csv(&outcome.data_ingestion.trained_file_path).unwrap();
        let test = Frame::read_csv(&outcome.data_ingestion.test_file_path).unwrap();
        assert_eq!(test.n_rows(), 60);
        assert_eq!(train, source.take_rows(&train_idx));
        assert_eq!(test, source.take_rows(&test_idx));

        assert!(outcome.data_validation.validation_status);
        assert!(outcome.data_validation.message.is_empty());

        let raw_labels = crate::entity::estimator::TargetValueMapping::encode_labels(
            &train.column("case_status").unwrap().labels(),
        )
        .unwrap();
        let transformed = load_array(&outcome.data_transformation.transformed_train_file_path).unwrap();
        let (_, balanced_labels) = split_features_labels(&transformed).unwrap();
        assert!(balance_ratio(&balanced_labels) > balance_ratio(&raw_labels));

        let accepted = outcome.model_evaluation.is_model_accepted;
        assert_eq!(outcome.model_pusher.is_some(), accepted);
        assert_eq!(store.upload_count(), usize::from(accepted));
        assert_eq!(bus.of_kind(EventKind::StageCompleted).len(), 5 + usize::from(accepted));
        assert_eq!(bus.of_kind(EventKind::ModelPublished).len(), usize::from(accepted));
    }

    #[test]
    fn rejected_model_is_never_uploaded() {
        let dir = tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.model_evaluation.min_improvement = 10.0;
        let store = Arc::new(MemoryModelStore::new());
        let bus = Arc::new(MemoryEventBus::new(64));
        let outcome = pipeline(settings, store.clone(), bus.clone())
            .run_pipeline()
            .unwrap();

        assert!(!outcome.model_evaluation.is_model_accepted);
        assert!(outcome.model_pusher.is_none());
        assert_eq!(store.upload_count(), 0);
        assert_eq!(bus.of_kind(EventKind::ModelRejected).len(), 1);
        assert!(bus.of_kind(EventKind::ModelPublished).is_empty());
        assert!(bus
            .snapshot()
            .iter()
            .all(|event| event.stage.as_deref() != Some("model_pusher")));
    }

    #[test]
    fn failed_validation_stops_the_run() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path());
        std::fs::write(
            &settings.data_validation.schema_file,
            SCHEMA.replace("  - case_status: category\n", "  - case_status: category\n  - requires_job_training: category\n"),
        )
        .unwrap();
        let store = Arc::new(MemoryModelStore::new());
        let bus = Arc::new(MemoryEventBus::new(64));
        let err = pipeline(settings, store.clone(), bus.clone())
            .run_pipeline()
            .unwrap_err();

        assert!(matches!(err, PipelineError::ValidationBlocked { .. }));
        assert!(err.to_string().contains("schema expects 11"));
        let failed = bus.of_kind(EventKind::StageFailed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].stage.as_deref(), Some("data_transformation"));
        assert_eq!(store.upload_count(), 0);
    }

    struct UnreachableSink;

    #[async_trait]
    impl EventPublisher for UnreachableSink {
        async fn publish(&self, event: PipelineEvent) -> anyhow::Result<()> {
            anyhow::bail!("event sink unreachable, dropped {:?}", event.kind)
        }
    }

    #[test]
    fn event_failures_do_not_fail_a_published_run() {
        let dir = tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.model_evaluation.min_improvement = -1.0;
        let store = Arc::new(MemoryModelStore::new());
        let outcome = pipeline(settings, store.clone(), Arc::new(UnreachableSink))
            .run_pipeline()
            .unwrap();

        assert!(outcome.model_evaluation.is_model_accepted);
        assert!(outcome.model_pusher.is_some());
        assert_eq!(store.upload_count(), 1);
    }
}
