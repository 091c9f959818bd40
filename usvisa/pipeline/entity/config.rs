use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Local};
use serde::Deserialize;

use crate::{
    classifier::LogisticParams,
    constants::{
        ARTIFACT_DIR, DATA_INGESTION_DIR_NAME, DATA_INGESTION_FEATURE_STORE_DIR,
        DATA_INGESTION_INGESTED_DIR, DATA_INGESTION_SPLIT_SEED,
        DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO, DATA_TRANSFORMATION_DIR_NAME,
        DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR, DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR,
        DATA_VALIDATION_DIR_NAME, DATA_VALIDATION_DRIFT_REPORT_DIR,
        DATA_VALIDATION_DRIFT_REPORT_FILE_NAME, FILE_NAME, MODEL_BUCKET_NAME, MODEL_FILE_NAME,
        MODEL_PUSHER_S3_KEY, MODEL_TRAINER_DIR_NAME, MODEL_TRAINER_EXPECTED_SCORE,
        MODEL_TRAINER_TRAINED_MODEL_DIR, PIPELINE_NAME, PREPROCESSING_OBJECT_FILE_NAME,
        TEST_FILE_NAME, TRAIN_FILE_NAME, TRANSFORMED_TEST_FILE_NAME, TRANSFORMED_TRAIN_FILE_NAME,
    },
    error::{PipelineError, PipelineResult},
};

/// Settings file for a training run, loaded from TOML.
///
/// Every section and key is optional. Relative paths resolve against the
/// directory holding the file.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Root under which timestamped run directories are created.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
    /// Directory for JSON-lines run logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Ingestion settings.
    #[serde(default)]
    pub data_ingestion: IngestionSettings,
    /// Validation settings.
    #[serde(default)]
    pub data_validation: ValidationSettings,
    /// Transformation settings.
    #[serde(default)]
    pub data_transformation: TransformationSettings,
    /// Trainer settings.
    #[serde(default)]
    pub model_trainer: TrainerSettings,
    /// Evaluation settings.
    #[serde(default)]
    pub model_evaluation: EvaluationSettings,
    /// Model store location.
    #[serde(default)]
    pub model_store: StoreSettings,
    /// Prediction settings.
    #[serde(default)]
    pub prediction: PredictionSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
            log_dir: default_log_dir(),
            data_ingestion: IngestionSettings::default(),
            data_validation: ValidationSettings::default(),
            data_transformation: TransformationSettings::default(),
            model_trainer: TrainerSettings::default(),
            model_evaluation: EvaluationSettings::default(),
            model_store: StoreSettings::default(),
            prediction: PredictionSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        Self::load_inner(path.as_ref()).map_err(|err| PipelineError::Config(format!("{err:#}")))
    }

    fn load_inner(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_paths(&source_dir);
        Ok(config)
    }

    /// Parses settings from a TOML string without resolving paths.
    pub fn from_toml(raw: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|err| PipelineError::Config(err.to_string()))?;
        config
            .validate()
            .map_err(|err| PipelineError::Config(format!("{err:#}")))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let ratio = self.data_ingestion.train_test_split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            bail!("train_test_split_ratio must be within (0, 1), got {ratio}");
        }
        if self.model_trainer.candidates.is_empty() {
            bail!("model_trainer.candidates must not be empty");
        }
        if self.data_transformation.smote_k == 0 || self.data_transformation.enn_k == 0 {
            bail!("resampling neighbour counts must be positive");
        }
        Ok(())
    }

    /// Makes every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.artifact_root);
        resolve(&mut self.log_dir);
        resolve(&mut self.data_ingestion.source_file);
        resolve(&mut self.data_validation.schema_file);
        resolve(&mut self.model_store.root);
    }
}

/// `[data_ingestion]`
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionSettings {
    /// Raw dataset export (CSV).
    #[serde(default = "default_source_file")]
    pub source_file: PathBuf,
    /// Share of rows routed to the test split.
    #[serde(default = "default_split_ratio")]
    pub train_test_split_ratio: f64,
    /// Shuffle seed.
    #[serde(default = "default_split_seed")]
    pub seed: u64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            source_file: default_source_file(),
            train_test_split_ratio: default_split_ratio(),
            seed: default_split_seed(),
        }
    }
}

/// `[data_validation]`
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSettings {
    /// YAML schema describing the dataset.
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,
    /// KS p-value below which a numerical column drifted.
    #[serde(default = "default_ks_threshold")]
    pub ks_threshold: f64,
    /// Jensen-Shannon distance at or above which a categorical column drifted.
    #[serde(default = "default_js_threshold")]
    pub js_threshold: f64,
    /// Share of drifted columns that flags dataset drift.
    #[serde(default = "default_drift_share")]
    pub drift_share: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            schema_file: default_schema_file(),
            ks_threshold: default_ks_threshold(),
            js_threshold: default_js_threshold(),
            drift_share: default_drift_share(),
        }
    }
}

/// `[data_transformation]`
#[derive(Debug, Clone, Deserialize)]
pub struct TransformationSettings {
    /// Reference year for `company_age`; the current year when omitted.
    #[serde(default)]
    pub current_year: Option<i32>,
    /// SMOTE neighbour count.
    #[serde(default = "default_smote_k")]
    pub smote_k: usize,
    /// ENN neighbour count.
    #[serde(default = "default_enn_k")]
    pub enn_k: usize,
    /// Resampling seed.
    #[serde(default = "default_split_seed")]
    pub resample_seed: u64,
}

impl Default for TransformationSettings {
    fn default() -> Self {
        Self {
            current_year: None,
            smote_k: default_smote_k(),
            enn_k: default_enn_k(),
            resample_seed: default_split_seed(),
        }
    }
}

/// `[model_trainer]`
#[derive(Debug, Clone, Deserialize)]
pub struct TrainerSettings {
    /// Minimum test f1 the selected model must reach.
    #[serde(default = "default_expected_accuracy")]
    pub expected_accuracy: f64,
    /// Hyperparameter grid (`[[model_trainer.candidates]]`).
    #[serde(default = "LogisticParams::default_grid")]
    pub candidates: Vec<LogisticParams>,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            expected_accuracy: default_expected_accuracy(),
            candidates: LogisticParams::default_grid(),
        }
    }
}

/// `[model_evaluation]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationSettings {
    /// Required f1 gain over the published model.
    #[serde(default)]
    pub min_improvement: f64,
}

/// `[model_store]`
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Directory holding one sub-directory per bucket.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
    /// Bucket of the published model.
    #[serde(default = "default_bucket")]
    pub bucket_name: String,
    /// Key of the published model.
    #[serde(default = "default_model_key")]
    pub model_key: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            bucket_name: default_bucket(),
            model_key: default_model_key(),
        }
    }
}

/// `[prediction]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionSettings {
    /// Bucket override; the model store bucket when omitted.
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// Key override; the model store key when omitted.
    #[serde(default)]
    pub model_key: Option<String>,
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from(ARTIFACT_DIR)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_source_file() -> PathBuf {
    PathBuf::from("data").join(FILE_NAME)
}

fn default_split_ratio() -> f64 {
    DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO
}

fn default_split_seed() -> u64 {
    DATA_INGESTION_SPLIT_SEED
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("schema.yaml")
}

fn default_ks_threshold() -> f64 {
    0.05
}

fn default_js_threshold() -> f64 {
    0.1
}

fn default_drift_share() -> f64 {
    0.5
}

fn default_smote_k() -> usize {
    5
}

fn default_enn_k() -> usize {
    3
}

fn default_expected_accuracy() -> f64 {
    MODEL_TRAINER_EXPECTED_SCORE
}

fn default_store_root() -> PathBuf {
    PathBuf::from("model_store")
}

fn default_bucket() -> String {
    MODEL_BUCKET_NAME.to_string()
}

fn default_model_key() -> String {
    format!("{MODEL_PUSHER_S3_KEY}/{MODEL_FILE_NAME}")
}

/// Run-scoped root: `<artifact_root>/<MM_DD_YYYY_HH_MM_SS>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPipelineConfig {
    /// Pipeline name.
    pub pipeline_name: String,
    /// Timestamped directory of this run.
    pub artifact_dir: PathBuf,
    /// Timestamp component of `artifact_dir`.
    pub timestamp: String,
}

impl TrainingPipelineConfig {
    /// Builds the run directory for `now`.
    #[must_use]
    pub fn new(artifact_root: impl AsRef<Path>, now: DateTime<Local>) -> Self {
        let timestamp = now.format("%m_%d_%Y_%H_%M_%S").to_string();
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            artifact_dir: artifact_root.as_ref().join(&timestamp),
            timestamp,
        }
    }

    /// Builds the run directory for the current local time.
    #[must_use]
    pub fn now(artifact_root: impl AsRef<Path>) -> Self {
        Self::new(artifact_root, Local::now())
    }
}

/// Paths and parameters of data ingestion.
#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    /// Stage directory.
    pub data_ingestion_dir: PathBuf,
    /// Raw export copied into the run.
    pub source_file_path: PathBuf,
    /// Feature store copy of the export.
    pub feature_store_file_path: PathBuf,
    /// Train split.
    pub training_file_path: PathBuf,
    /// Test split.
    pub testing_file_path: PathBuf,
    /// Share of rows routed to the test split.
    pub train_test_split_ratio: f64,
    /// Shuffle seed.
    pub seed: u64,
}

impl DataIngestionConfig {
    /// Derives the stage configuration.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineConfig) -> Self {
        let dir = run.artifact_dir.join(DATA_INGESTION_DIR_NAME);
        Self {
            feature_store_file_path: dir.join(DATA_INGESTION_FEATURE_STORE_DIR).join(FILE_NAME),
            training_file_path: dir.join(DATA_INGESTION_INGESTED_DIR).join(TRAIN_FILE_NAME),
            testing_file_path: dir.join(DATA_INGESTION_INGESTED_DIR).join(TEST_FILE_NAME),
            data_ingestion_dir: dir,
            source_file_path: settings.data_ingestion.source_file.clone(),
            train_test_split_ratio: settings.data_ingestion.train_test_split_ratio,
            seed: settings.data_ingestion.seed,
        }
    }
}

/// Paths and thresholds of data validation.
#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    /// Stage directory.
    pub data_validation_dir: PathBuf,
    /// Drift report YAML.
    pub drift_report_file_path: PathBuf,
    /// Schema YAML.
    pub schema_file_path: PathBuf,
    /// KS p-value threshold.
    pub ks_threshold: f64,
    /// Jensen-Shannon distance threshold.
    pub js_threshold: f64,
    /// Dataset drift share.
    pub drift_share: f64,
}

impl DataValidationConfig {
    /// Derives the stage configuration.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineConfig) -> Self {
        let dir = run.artifact_dir.join(DATA_VALIDATION_DIR_NAME);
        let validation = &settings.data_validation;
        Self {
            drift_report_file_path: dir
                .join(DATA_VALIDATION_DRIFT_REPORT_DIR)
                .join(DATA_VALIDATION_DRIFT_REPORT_FILE_NAME),
            data_validation_dir: dir,
            schema_file_path: validation.schema_file.clone(),
            ks_threshold: validation.ks_threshold,
            js_threshold: validation.js_threshold,
            drift_share: validation.drift_share,
        }
    }
}

/// Paths and parameters of data transformation.
#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    /// Stage directory.
    pub data_transformation_dir: PathBuf,
    /// Transformed train array.
    pub transformed_train_file_path: PathBuf,
    /// Transformed test array.
    pub transformed_test_file_path: PathBuf,
    /// Fitted preprocessor.
    pub transformed_object_file_path: PathBuf,
    /// Schema YAML.
    pub schema_file_path: PathBuf,
    /// Reference year for `company_age`.
    pub current_year: i32,
    /// SMOTE neighbour count.
    pub smote_k: usize,
    /// ENN neighbour count.
    pub enn_k: usize,
    /// Resampling seed.
    pub resample_seed: u64,
}

impl DataTransformationConfig {
    /// Derives the stage configuration.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineConfig) -> Self {
        let dir = run.artifact_dir.join(DATA_TRANSFORMATION_DIR_NAME);
        let data = dir.join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR);
        let transformation = &settings.data_transformation;
        Self {
            transformed_train_file_path: data.join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: data.join(TRANSFORMED_TEST_FILE_NAME),
            transformed_object_file_path: dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            data_transformation_dir: dir,
            schema_file_path: settings.data_validation.schema_file.clone(),
            current_year: transformation
                .current_year
                .unwrap_or_else(|| Local::now().year()),
            smote_k: transformation.smote_k,
            enn_k: transformation.enn_k,
            resample_seed: transformation.resample_seed,
        }
    }
}

/// Paths and parameters of the model trainer.
#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    /// Stage directory.
    pub model_trainer_dir: PathBuf,
    /// Serialized model bundle.
    pub trained_model_file_path: PathBuf,
    /// Minimum acceptable test f1.
    pub expected_accuracy: f64,
    /// Hyperparameter grid.
    pub candidates: Vec<LogisticParams>,
}

impl ModelTrainerConfig {
    /// Derives the stage configuration.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineConfig) -> Self {
        let dir = run.artifact_dir.join(MODEL_TRAINER_DIR_NAME);
        Self {
            trained_model_file_path: dir
                .join(MODEL_TRAINER_TRAINED_MODEL_DIR)
                .join(MODEL_FILE_NAME),
            model_trainer_dir: dir,
            expected_accuracy: settings.model_trainer.expected_accuracy,
            candidates: settings.model_trainer.candidates.clone(),
        }
    }
}

/// Parameters of model evaluation.
#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    /// Required f1 gain.
    pub changed_threshold_score: f64,
    /// Bucket of the published model.
    pub bucket_name: String,
    /// Key of the published model.
    pub s3_model_key_path: String,
    /// Reference year for `company_age`.
    pub current_year: i32,
}

impl ModelEvaluationConfig {
    /// Derives the stage configuration.
    #[must_use]
    pub fn new(settings: &PipelineConfig) -> Self {
        Self {
            changed_threshold_score: settings.model_evaluation.min_improvement,
            bucket_name: settings.model_store.bucket_name.clone(),
            s3_model_key_path: settings.model_store.model_key.clone(),
            current_year: settings
                .data_transformation
                .current_year
                .unwrap_or_else(|| Local::now().year()),
        }
    }
}

/// Destination of the model pusher.
#[derive(Debug, Clone)]
pub struct ModelPusherConfig {
    /// Target bucket.
    pub bucket_name: String,
    /// Target key.
    pub s3_model_key_path: String,
}

impl ModelPusherConfig {
    /// Derives the stage configuration.
    #[must_use]
    pub fn new(settings: &PipelineConfig) -> Self {
        Self {
            bucket_name: settings.model_store.bucket_name.clone(),
            s3_model_key_path: settings.model_store.model_key.clone(),
        }
    }
}

/// Location of the model used for prediction.
#[derive(Debug, Clone)]
pub struct VisaPredictorConfig {
    /// Bucket of the published model.
    pub model_bucket_name: String,
    /// Key of the published model.
    pub model_file_path: String,
}

impl VisaPredictorConfig {
    /// Derives the prediction configuration.
    #[must_use]
    pub fn new(settings: &PipelineConfig) -> Self {
        Self {
            model_bucket_name: settings
                .prediction
                .bucket_name
                .clone()
                .unwrap_or_else(|| settings.model_store.bucket_name.clone()),
            model_file_path: settings
                .prediction
                .model_key
                .clone()
                .unwrap_or_else(|| settings.model_store.model_key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert!((config.data_ingestion.train_test_split_ratio - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.data_ingestion.seed, 42);
        assert!((config.model_trainer.expected_accuracy - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.model_store.model_key, "model-registry/model.json");
        assert_eq!(config.model_trainer.candidates, LogisticParams::default_grid());
        assert!(config.model_evaluation.min_improvement.abs() < f64::EPSILON);
    }

    #[test]
    fn parses_sections_and_candidates() {
        let config = PipelineConfig::from_toml(
            r#"
[data_ingestion]
train_test_split_ratio = 0.25

[data_transformation]
current_year = 2024

[[model_trainer.candidates]]
learning_rate = 0.2
epochs = 50

[prediction]
model_key = "staging/model.json"
"#,
        )
        .unwrap();
        assert!((config.data_ingestion.train_test_split_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.model_trainer.candidates.len(), 1);
        assert!(config.model_trainer.candidates[0].l2.abs() < f64::EPSILON);
        let predictor = VisaPredictorConfig::new(&config);
        assert_eq!(predictor.model_file_path, "staging/model.json");
        assert_eq!(predictor.model_bucket_name, MODEL_BUCKET_NAME);
        let run = TrainingPipelineConfig::now("artifact");
        assert_eq!(DataTransformationConfig::new(&run, &config).current_year, 2024);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let err = PipelineConfig::from_toml("[data_ingestion]\ntrain_test_split_ratio = 1.5").unwrap_err();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("train_test_split_ratio")));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "[data_validation]\nschema_file = \"schema.yaml\"\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.data_validation.schema_file, dir.path().join("schema.yaml"));
        assert_eq!(config.artifact_root, dir.path().join("artifact"));
    }

    #[test]
    fn stage_paths_follow_run_directory() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let run = TrainingPipelineConfig::new("artifact", now);
        assert_eq!(run.timestamp, "03_09_2024_14_05_07");
        let settings = PipelineConfig::default();
        let ingestion = DataIngestionConfig::new(&run, &settings);
        assert_eq!(
            ingestion.training_file_path,
            PathBuf::from("artifact/03_09_2024_14_05_07/data_ingestion/ingested/train.csv")
        );
        let validation = DataValidationConfig::new(&run, &settings);
        assert!(validation
            .drift_report_file_path
            .ends_with("data_validation/drift_report/report.yaml"));
        let trainer = ModelTrainerConfig::new(&run, &settings);
        assert!(trainer
            .trained_model_file_path
            .ends_with("model_trainer/trained_model/model.json"));
    }

    #[test]
    fn shipped_config_loads() {
        let config =
            PipelineConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../config/pipeline.toml"))
                .unwrap();
        assert_eq!(config.model_trainer.candidates, LogisticParams::default_grid());
        assert!(config.data_validation.schema_file.ends_with("config/schema.yaml"));
        assert!(config.data_transformation.current_year.is_none());
    }
}
