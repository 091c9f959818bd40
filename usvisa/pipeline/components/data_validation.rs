use serde_json::json;

use super::drift::{detect_drift, DriftThresholds};
use crate::{
    entity::{
        artifact::{DataIngestionArtifact, DataValidationArtifact},
        config::DataValidationConfig,
        schema::SchemaConfig,
    },
    error::{PipelineResult, Stage, StageResultExt},
    frame::Frame,
    telemetry::PipelineTelemetry,
    utils::write_yaml_file,
};

const STAGE: Stage = Stage::DataValidation;

/// Checks both splits against the schema and writes a drift report.
#[derive(Debug)]
pub struct DataValidation {
    ingestion: DataIngestionArtifact,
    config: DataValidationConfig,
    schema: SchemaConfig,
    telemetry: PipelineTelemetry,
}

/// Column count check. Returns a failure description, if any.
#[must_use]
pub fn validate_number_of_columns(frame: &Frame, schema: &SchemaConfig, split: &str) -> Option<String> {
    let expected = schema.column_count();
    let actual = frame.n_cols();
    (actual != expected)
        .then(|| format!("{split} dataframe has {actual} columns, schema expects {expected}."))
}

/// Presence checks for numerical, categorical and drop columns. Returns one
/// description per missing column.
#[must_use]
pub fn is_column_exist(frame: &Frame, schema: &SchemaConfig, split: &str) -> Vec<String> {
    let groups = [
        ("numerical", &schema.numerical_columns),
        ("categorical", &schema.categorical_columns),
        ("drop", &schema.drop_columns),
    ];
    groups
        .into_iter()
        .flat_map(|(group, columns)| {
            columns
                .iter()
                .filter(|column| !frame.has_column(column))
                .map(move |column| format!("{split} dataframe is missing {group} column `{column}`."))
        })
        .collect()
}

impl DataValidation {
    /// Creates the stage, loading the schema file.
    pub fn new(
        ingestion: DataIngestionArtifact,
        config: DataValidationConfig,
        telemetry: PipelineTelemetry,
    ) -> PipelineResult<Self> {
        let schema = SchemaConfig::load(&config.schema_file_path).stage(STAGE)?;
        Ok(Self::with_schema(ingestion, config, schema, telemetry))
    }

    /// Creates the stage with an already loaded schema.
    #[must_use]
    pub const fn with_schema(
        ingestion: DataIngestionArtifact,
        config: DataValidationConfig,
        schema: SchemaConfig,
        telemetry: PipelineTelemetry,
    ) -> Self {
        Self {
            ingestion,
            config,
            schema,
            telemetry,
        }
    }

    fn check(&self, frame: &Frame, split: &str) -> Vec<String> {
        let mut failures: Vec<String> =
            validate_number_of_columns(frame, &self.schema, split).into_iter().collect();
        failures.extend(is_column_exist(frame, &self.schema, split));
        failures
    }

    /// Runs the stage. Structural failures yield a false status, not an error.
    pub fn initiate_data_validation(&self) -> PipelineResult<DataValidationArtifact> {
        let train = Frame::read_csv(&self.ingestion.trained_file_path).stage(STAGE)?;
        let test = Frame::read_csv(&self.ingestion.test_file_path).stage(STAGE)?;

        let mut failures = self.check(&train, "Train");
        failures.extend(self.check(&test, "Test"));
        let validation_status = failures.is_empty();
        let message = failures.join(" ");

        let mut drift_report_file_path = None;
        let mut drift_detected = false;
        if validation_status {
            let thresholds = DriftThresholds {
                ks_p_value: self.config.ks_threshold,
                js_distance: self.config.js_threshold,
                drift_share: self.config.drift_share,
            };
            let report = detect_drift(&train, &test, &self.schema, thresholds).stage(STAGE)?;
            write_yaml_file(&self.config.drift_report_file_path, &report).stage(STAGE)?;
            drift_detected = report.dataset_drift;
            drift_report_file_path = Some(self.config.drift_report_file_path.clone());
            if drift_detected {
                self.telemetry.warn(
                    STAGE,
                    "drift detected",
                    json!({
                        "drifted_columns": report.number_of_drifted_columns,
                        "columns": report.number_of_columns,
                    }),
                );
            }
        } else {
            self.telemetry.warn(STAGE, "validation failed", json!({ "message": message }));
        }

        self.telemetry.info(
            STAGE,
            "data validation complete",
            json!({ "validation_status": validation_status, "drift_detected": drift_detected }),
        );
        Ok(DataValidationArtifact {
            validation_status,
            message,
            drift_report_file_path,
            drift_detected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity::config::{PipelineConfig, TrainingPipelineConfig},
        frame::Column,
    };
    use std::path::Path;
    use tempfile::tempdir;

    const SCHEMA: &str = r"
columns:
  - case_id: category
  - continent: category
  - prevailing_wage: float
  - case_status: category
numerical_columns: [prevailing_wage]
categorical_columns: [case_id, continent, case_status]
drop_columns: [case_id]
";

    fn write_split(path: &Path, with_wage: bool) {
        let mut frame = Frame::from_columns([
            ("case_id", Column::Text(vec!["a".into(), "b".into()])),
            ("continent", Column::Text(vec!["Asia".into(), "Europe".into()])),
            ("case_status", Column::Text(vec!["Certified".into(), "Denied".into()])),
        ])
        .unwrap();
        if with_wage {
            frame
                .push_column("prevailing_wage", Column::Numeric(vec![10.0, 20.0]))
                .unwrap();
        }
        frame.write_csv(path).unwrap();
    }

    fn stage(dir: &Path, train_wage: bool, test_wage: bool) -> DataValidation {
        let train = dir.join("train.csv");
        let test = dir.join("test.csv");
        write_split(&train, train_wage);
        write_split(&test, test_wage);
        let run = TrainingPipelineConfig::now(dir.join("artifact"));
        DataValidation::with_schema(
            DataIngestionArtifact {
                trained_file_path: train,
                test_file_path: test,
            },
            DataValidationConfig::new(&run, &PipelineConfig::default()),
            SchemaConfig::from_yaml(SCHEMA).unwrap(),
            PipelineTelemetry::disabled("test"),
        )
    }

    #[test]
    fn matching_columns_pass_with_empty_message() {
        let dir = tempdir().unwrap();
        let artifact = stage(dir.path(), true, true).initiate_data_validation().unwrap();
        assert!(artifact.validation_status);
        assert!(artifact.message.is_empty());
        let report = artifact.drift_report_file_path.unwrap();
        assert!(report.is_file());
    }

    #[test]
    fn missing_column_is_named() {
        let dir = tempdir().unwrap();
        let artifact = stage(dir.path(), true, false).initiate_data_validation().unwrap();
        assert!(!artifact.validation_status);
        assert!(artifact.message.contains("Test dataframe is missing numerical column `prevailing_wage`."));
        assert!(artifact.message.contains("Test dataframe has 3 columns, schema expects 4."));
        assert!(!artifact.message.contains("Train"));
        assert!(artifact.drift_report_file_path.is_none());
    }

    #[test]
    fn missing_split_file_is_an_error() {
        let dir = tempdir().unwrap();
        let validation = stage(dir.path(), true, true);
        std::fs::remove_file(dir.path().join("test.csv")).unwrap();
        assert!(validation.initiate_data_validation().is_err());
    }
}
