//! Names and defaults shared by every pipeline stage.

/// Label column of the raw visa dataset.
pub const TARGET_COLUMN: &str = "case_status";
/// Column holding the company's founding year.
pub const YEAR_ESTABLISHED_COLUMN: &str = "yr_of_estab";
/// Derived feature: `current_year - yr_of_estab`.
pub const COMPANY_AGE_COLUMN: &str = "company_age";
/// Document-store key column dropped during export.
pub const EXPORT_ID_COLUMN: &str = "_id";

/// Name of the training pipeline, used for log module names.
pub const PIPELINE_NAME: &str = "usvisa";
/// Root directory for timestamped artifacts.
pub const ARTIFACT_DIR: &str = "artifact";

/// Data ingestion layout.
pub const DATA_INGESTION_DIR_NAME: &str = "data_ingestion";
/// Feature store sub-directory.
pub const DATA_INGESTION_FEATURE_STORE_DIR: &str = "feature_store";
/// Split train/test sub-directory.
pub const DATA_INGESTION_INGESTED_DIR: &str = "ingested";
/// Feature store file name.
pub const FILE_NAME: &str = "usvisa.csv";
/// Train split file name.
pub const TRAIN_FILE_NAME: &str = "train.csv";
/// Test split file name.
pub const TEST_FILE_NAME: &str = "test.csv";
/// Default share of rows routed to the test split.
pub const DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO: f64 = 0.2;
/// Default seed for the train/test shuffle.
pub const DATA_INGESTION_SPLIT_SEED: u64 = 42;

/// Data validation layout.
pub const DATA_VALIDATION_DIR_NAME: &str = "data_validation";
/// Drift report sub-directory.
pub const DATA_VALIDATION_DRIFT_REPORT_DIR: &str = "drift_report";
/// Drift report file name.
pub const DATA_VALIDATION_DRIFT_REPORT_FILE_NAME: &str = "report.yaml";

/// Data transformation layout.
pub const DATA_TRANSFORMATION_DIR_NAME: &str = "data_transformation";
/// Transformed arrays sub-directory.
pub const DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR: &str = "transformed";
/// Fitted preprocessor sub-directory.
pub const DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
/// Fitted preprocessor file name.
pub const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.json";
/// Transformed train array file name.
pub const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.json";
/// Transformed test array file name.
pub const TRANSFORMED_TEST_FILE_NAME: &str = "test.json";

/// Model trainer layout.
pub const MODEL_TRAINER_DIR_NAME: &str = "model_trainer";
/// Trained model sub-directory.
pub const MODEL_TRAINER_TRAINED_MODEL_DIR: &str = "trained_model";
/// Serialized model file name (local and in the store).
pub const MODEL_FILE_NAME: &str = "model.json";
/// Minimum test f1 a trained model must reach.
pub const MODEL_TRAINER_EXPECTED_SCORE: f64 = 0.6;

/// Default model store bucket.
pub const MODEL_BUCKET_NAME: &str = "usvisa-model2024";
/// Default key of the published model inside the bucket.
pub const MODEL_PUSHER_S3_KEY: &str = "model-registry";
