use std::sync::Arc;

use anyhow::anyhow;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    entity::{
        config::VisaPredictorConfig,
        estimator::{CaseStatus, TargetValueMapping},
    },
    error::{PipelineError, PipelineResult, Stage, StageResultExt},
    frame::{Column, Frame, FrameError},
    storage::{ModelStore, VisaEstimator},
};

/// One visa application as entered for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisaData {
    /// Applicant's continent.
    pub continent: String,
    /// Highest education level.
    pub education_of_employee: String,
    /// `Y` or `N`.
    pub has_job_experience: String,
    /// `Y` or `N`.
    pub requires_job_training: String,
    /// Employer head count.
    pub no_of_employees: f64,
    /// US region of the position.
    pub region_of_employment: String,
    /// Offered wage in `unit_of_wage`.
    pub prevailing_wage: f64,
    /// `Hour`, `Week`, `Month` or `Year`.
    pub unit_of_wage: String,
    /// `Y` or `N`.
    pub full_time_position: String,
    /// Years since the employer was established.
    pub company_age: f64,
}

impl VisaData {
    /// Field values keyed by column name, in column order.
    #[must_use]
    pub fn as_map(&self) -> IndexMap<&'static str, Value> {
        IndexMap::from([
            ("continent", json!(self.continent)),
            ("education_of_employee", json!(self.education_of_employee)),
            ("has_job_experience", json!(self.has_job_experience)),
            ("requires_job_training", json!(self.requires_job_training)),
            ("no_of_employees", json!(self.no_of_employees)),
            ("region_of_employment", json!(self.region_of_employment)),
            ("prevailing_wage", json!(self.prevailing_wage)),
            ("unit_of_wage", json!(self.unit_of_wage)),
            ("full_time_position", json!(self.full_time_position)),
            ("company_age", json!(self.company_age)),
        ])
    }

    /// Single-row frame ready for the published model.
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let text = |value: &str| Column::Text(vec![value.to_string()]);
        let number = |value: f64| Column::Numeric(vec![value]);
        Frame::from_columns([
            ("continent", text(&self.continent)),
            ("education_of_employee", text(&self.education_of_employee)),
            ("has_job_experience", text(&self.has_job_experience)),
            ("requires_job_training", text(&self.requires_job_training)),
            ("no_of_employees", number(self.no_of_employees)),
            ("region_of_employment", text(&self.region_of_employment)),
            ("prevailing_wage", number(self.prevailing_wage)),
            ("unit_of_wage", text(&self.unit_of_wage)),
            ("full_time_position", text(&self.full_time_position)),
            ("company_age", number(self.company_age)),
        ])
    }
}

/// Scores frames with the currently published model.
#[derive(Debug)]
pub struct VisaClassifier {
    estimator: VisaEstimator,
}

impl VisaClassifier {
    /// Creates a classifier bound to the configured bucket and key.
    pub fn new(config: &VisaPredictorConfig, store: Arc<dyn ModelStore>) -> Self {
        Self {
            estimator: VisaEstimator::new(
                store,
                &config.model_bucket_name,
                &config.model_file_path,
            ),
        }
    }

    /// Predicted case status for every row.
    pub fn predict(&self, frame: &Frame) -> PipelineResult<Vec<CaseStatus>> {
        let codes = self.estimator.predict(frame).stage(Stage::Prediction)?;
        codes
            .into_iter()
            .map(|code| {
                TargetValueMapping::decode(code).ok_or_else(|| {
                    PipelineError::stage(Stage::Prediction, anyhow!("unknown class code {code}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::{LogisticParams, LogisticRegression},
        entity::{config::PipelineConfig, estimator::VisaModel},
        preprocessing::{column_transformer::ColumnStep, Preprocessor, StandardScaler},
        storage::MemoryModelStore,
        utils::save_object,
    };
    use ndarray::array;
    use tempfile::tempdir;

    fn application(prevailing_wage: f64) -> VisaData {
        VisaData {
            continent: "Asia".into(),
            education_of_employee: "Master's".into(),
            has_job_experience: "Y".into(),
            requires_job_training: "N".into(),
            no_of_employees: 2412.0,
            region_of_employment: "Northeast".into(),
            prevailing_wage,
            unit_of_wage: "Year".into(),
            full_time_position: "Y".into(),
            company_age: 22.0,
        }
    }

    #[test]
    fn application_becomes_single_row_frame() {
        let data = application(83425.65);
        let frame = data.to_frame().unwrap();
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.n_cols(), 10);
        let names: Vec<&str> = frame.column_names().collect();
        let keys: Vec<&str> = data.as_map().keys().copied().collect();
        assert_eq!(names, keys);
        assert_eq!(frame.numeric("prevailing_wage").unwrap(), &[83425.65]);
    }

    #[test]
    fn scores_with_published_model() {
        let dir = tempdir().unwrap();
        let wages = Frame::from_columns([(
            "prevailing_wage",
            Column::Numeric(vec![1000.0, 2000.0, 3000.0, 4000.0]),
        )])
        .unwrap();
        let preprocessor = Preprocessor::new()
            .with_step(
                "standard_scaler",
                ColumnStep::Standard(StandardScaler::new()),
                vec!["prevailing_wage".into()],
            )
            .fit(&wages)
            .unwrap();
        let classifier = LogisticRegression::fit(
            LogisticParams::default(),
            &array![[-1.34], [-0.45], [0.45], [1.34]],
            &[0, 0, 1, 1],
        )
        .unwrap();
        let path = dir.path().join("model.json");
        save_object(&path, &VisaModel::new(preprocessor, classifier)).unwrap();

        let config = VisaPredictorConfig::new(&PipelineConfig::default());
        let store = Arc::new(MemoryModelStore::new());
        store
            .upload_file(&path, &config.model_bucket_name, &config.model_file_path)
            .unwrap();
        let classifier = VisaClassifier::new(&config, store);

        let low = classifier.predict(&application(1200.0).to_frame().unwrap()).unwrap();
        let high = classifier.predict(&application(3900.0).to_frame().unwrap()).unwrap();
        assert_eq!(low, vec![CaseStatus::Certified]);
        assert_eq!(high, vec![CaseStatus::Denied]);
    }

    #[test]
    fn missing_model_is_a_prediction_error() {
        let classifier = VisaClassifier::new(
            &VisaPredictorConfig::new(&PipelineConfig::default()),
            Arc::new(MemoryModelStore::new()),
        );
        let err = classifier
            .predict(&application(1.0).to_frame().unwrap())
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(Stage::Prediction));
    }
}
