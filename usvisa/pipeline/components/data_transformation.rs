use serde_json::json;

use crate::{
    constants::{COMPANY_AGE_COLUMN, TARGET_COLUMN, YEAR_ESTABLISHED_COLUMN},
    entity::{
        artifact::{DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact},
        config::DataTransformationConfig,
        estimator::TargetValueMapping,
        schema::SchemaConfig,
    },
    error::{PipelineError, PipelineResult, Stage, StageResultExt},
    frame::{Column, Frame, FrameError},
    preprocessing::Preprocessor,
    resampling::{balance_ratio, SmoteEnn},
    telemetry::PipelineTelemetry,
    utils::{join_features_labels, save_array},
};

const STAGE: Stage = Stage::DataTransformation;

/// Adds `company_age = current_year - yr_of_estab`.
pub fn add_company_age(frame: &mut Frame, current_year: i32) -> Result<(), FrameError> {
    let year = f64::from(current_year);
    let ages = frame
        .numeric(YEAR_ESTABLISHED_COLUMN)?
        .iter()
        .map(|established| year - established)
        .collect();
    frame.set_column(COMPANY_AGE_COLUMN, Column::Numeric(ages))
}

/// Splits a raw frame into model features and encoded labels: derives
/// `company_age`, removes the target and the schema's drop columns.
pub fn prepare_features(
    frame: &Frame,
    schema: &SchemaConfig,
    current_year: i32,
) -> PipelineResult<(Frame, Vec<usize>)> {
    let labels = frame.column(TARGET_COLUMN).stage(STAGE)?.labels();
    let labels = TargetValueMapping::encode_labels(&labels).stage(STAGE)?;
    let mut features = frame.drop_columns(&[TARGET_COLUMN]).stage(STAGE)?;
    add_company_age(&mut features, current_year).stage(STAGE)?;
    let features = features.drop_columns(&schema.drop_columns).stage(STAGE)?;
    Ok((features, labels))
}

/// Fits the preprocessor, balances classes and writes the arrays.
#[derive(Debug)]
pub struct DataTransformation {
    ingestion: DataIngestionArtifact,
    validation: DataValidationArtifact,
    config: DataTransformationConfig,
    telemetry: PipelineTelemetry,
}

impl DataTransformation {
    /// Creates the stage.
    #[must_use]
    pub const fn new(
        ingestion: DataIngestionArtifact,
        validation: DataValidationArtifact,
        config: DataTransformationConfig,
        telemetry: PipelineTelemetry,
    ) -> Self {
        Self {
            ingestion,
            validation,
            config,
            telemetry,
        }
    }

    /// Runs the stage. Refuses to run on a failed validation.
    pub fn initiate_data_transformation(&self) -> PipelineResult<DataTransformationArtifact> {
        if !self.validation.validation_status {
            return Err(PipelineError::ValidationBlocked {
                message: self.validation.message.clone(),
            });
        }
        let schema = SchemaConfig::load(&self.config.schema_file_path).stage(STAGE)?;
        let train = Frame::read_csv(&self.ingestion.trained_file_path).stage(STAGE)?;
        let test = Frame::read_csv(&self.ingestion.test_file_path).stage(STAGE)?;
        let (train_features, train_labels) =
            prepare_features(&train, &schema, self.config.current_year)?;
        let (test_features, test_labels) =
            prepare_features(&test, &schema, self.config.current_year)?;

        let (preprocessor, train_arr) = Preprocessor::from_schema(&schema)
            .fit_transform(&train_features)
            .stage(STAGE)?;
        let test_arr = preprocessor.transform(&test_features).stage(STAGE)?;
        self.telemetry.info(
            STAGE,
            "fitted preprocessor on training features",
            json!({
                "features_in": train_features.n_cols(),
                "features_out": preprocessor.n_features_out(),
            }),
        );

        let resampler = SmoteEnn::new(
            self.config.smote_k,
            self.config.enn_k,
            self.config.resample_seed,
        );
        let (train_arr, train_out) = resampler
            .fit_resample(&train_arr, &train_labels)
            .stage(STAGE)?;
        let (test_arr, test_out) = resampler
            .fit_resample(&test_arr, &test_labels)
            .stage(STAGE)?;
        self.telemetry.info(
            STAGE,
            "balanced classes with SMOTEENN",
            json!({
                "train_rows": [train_labels.len(), train_out.len()],
                "train_balance": [balance_ratio(&train_labels), balance_ratio(&train_out)],
                "test_rows": [test_labels.len(), test_out.len()],
            }),
        );

        let train_arr = join_features_labels(&train_arr, &train_out).stage(STAGE)?;
        let test_arr = join_features_labels(&test_arr, &test_out).stage(STAGE)?;
        preprocessor
            .save(&self.config.transformed_object_file_path)
            .stage(STAGE)?;
        save_array(&self.config.transformed_train_file_path, &train_arr).stage(STAGE)?;
        save_array(&self.config.transformed_test_file_path, &test_arr).stage(STAGE)?;

        Ok(DataTransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        })
    }
}
