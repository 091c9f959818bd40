use std::{fs, path::Path};

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::{
    encoding::{FittedOneHotEncoder, FittedOrdinalEncoder},
    power::FittedPowerTransformer,
    scaling::FittedStandardScaler,
    FittedTransformer, HandleUnknown, OneHotEncoder, OrdinalEncoder, PowerTransformer,
    PreprocessingError, StandardScaler, Transformer,
};
use crate::{entity::schema::SchemaConfig, frame::Frame};

/// Unfitted step of the column transformer.
#[derive(Clone, Debug)]
pub enum ColumnStep {
    /// Nominal encoding.
    OneHot(OneHotEncoder),
    /// Ordered encoding.
    Ordinal(OrdinalEncoder),
    /// Skew reduction.
    Power(PowerTransformer),
    /// Scaling.
    Standard(StandardScaler),
}

/// Fitted step of the column transformer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FittedColumnStep {
    /// Nominal encoding.
    OneHot(FittedOneHotEncoder),
    /// Ordered encoding.
    Ordinal(FittedOrdinalEncoder),
    /// Skew reduction.
    Power(FittedPowerTransformer),
    /// Scaling.
    Standard(FittedStandardScaler),
}

impl FittedColumnStep {
    fn as_transformer(&self) -> &dyn FittedTransformer {
        match self {
            Self::OneHot(step) => step,
            Self::Ordinal(step) => step,
            Self::Power(step) => step,
            Self::Standard(step) => step,
        }
    }
}

impl ColumnStep {
    fn fit(&self, frame: &Frame, columns: &[String]) -> Result<FittedColumnStep, PreprocessingError> {
        Ok(match self {
            Self::OneHot(step) => FittedColumnStep::OneHot(step.fit(frame, columns)?),
            Self::Ordinal(step) => FittedColumnStep::Ordinal(step.fit(frame, columns)?),
            Self::Power(step) => FittedColumnStep::Power(step.fit(frame, columns)?),
            Self::Standard(step) => FittedColumnStep::Standard(step.fit(frame, columns)?),
        })
    }
}

/// Applies each step to its own column group and concatenates the outputs
/// horizontally, in step order. Columns not named by any step are dropped.
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    steps: Vec<(String, ColumnStep, Vec<String>)>,
}

impl Preprocessor {
    /// Creates an empty preprocessor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named step. Steps with no columns are skipped at fit time.
    #[must_use]
    pub fn with_step(mut self, name: impl Into<String>, step: ColumnStep, columns: Vec<String>) -> Self {
        self.steps.push((name.into(), step, columns));
        self
    }

    /// Standard layout for the visa dataset: one-hot `oh_columns`, ordinal
    /// `or_columns`, Yeo-Johnson `transform_columns`, standard-scale the rest.
    #[must_use]
    pub fn from_schema(schema: &SchemaConfig) -> Self {
        Self::new()
            .with_step(
                "one_hot_encoder",
                ColumnStep::OneHot(OneHotEncoder::new().with_handle_unknown(HandleUnknown::Ignore)),
                schema.oh_columns.clone(),
            )
            .with_step(
                "ordinal_encoder",
                ColumnStep::Ordinal(OrdinalEncoder::new().with_handle_unknown(HandleUnknown::Ignore)),
                schema.or_columns.clone(),
            )
            .with_step(
                "power_transformer",
                ColumnStep::Power(PowerTransformer::new()),
                schema.transform_columns.clone(),
            )
            .with_step(
                "standard_scaler",
                ColumnStep::Standard(StandardScaler::new()),
                schema.scaled_columns(),
            )
    }

    /// Fits every step on the training frame.
    pub fn fit(&self, frame: &Frame) -> Result<FittedPreprocessor, PreprocessingError> {
        let steps = self
            .steps
            .iter()
            .filter(|(_, _, columns)| !columns.is_empty())
            .map(|(name, step, columns)| {
                Ok(NamedStep {
                    name: name.clone(),
                    step: step.fit(frame, columns)?,
                })
            })
            .collect::<Result<Vec<_>, PreprocessingError>>()?;
        Ok(FittedPreprocessor { steps })
    }

    /// Fits on `frame` and transforms it.
    pub fn fit_transform(
        &self,
        frame: &Frame,
    ) -> Result<(FittedPreprocessor, Array2<f64>), PreprocessingError> {
        let fitted = self.fit(frame)?;
        let out = fitted.transform(frame)?;
        Ok((fitted, out))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct NamedStep {
    name: String,
    #[serde(flatten)]
    step: FittedColumnStep,
}

/// Fitted preprocessor, persisted as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    steps: Vec<NamedStep>,
}

impl FittedPreprocessor {
    /// Transforms a frame into the model's feature matrix.
    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>, PreprocessingError> {
        let blocks = self
            .steps
            .iter()
            .map(|named| named.step.as_transformer().transform(frame))
            .collect::<Result<Vec<_>, _>>()?;
        if blocks.is_empty() {
            return Ok(Array2::zeros((frame.n_rows(), 0)));
        }
        let views: Vec<ArrayView2<'_, f64>> = blocks.iter().map(|block| block.view()).collect();
        concatenate(Axis(1), &views)
            .map_err(|err| PreprocessingError::Serialization(format!("concatenate: {err}")))
    }

    /// Total output width.
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        self.steps
            .iter()
            .map(|named| named.step.as_transformer().n_features_out())
            .sum()
    }

    /// Output feature names in column order.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|named| named.step.as_transformer().feature_names())
            .collect()
    }

    /// Names of the fitted steps.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|named| named.name.as_str()).collect()
    }

    /// Writes the fitted preprocessor as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PreprocessingError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| PreprocessingError::Serialization(err.to_string()))?;
        }
        let data = serde_json::to_vec_pretty(self)
            .map_err(|err| PreprocessingError::Serialization(err.to_string()))?;
        fs::write(path, data).map_err(|err| PreprocessingError::Serialization(err.to_string()))
    }

    /// Reads a fitted preprocessor from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreprocessingError> {
        let data = fs::read(path.as_ref())
            .map_err(|err| PreprocessingError::Serialization(err.to_string()))?;
        serde_json::from_slice(&data).map_err(|err| PreprocessingError::Serialization(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;
    use tempfile::tempdir;

    fn frame() -> Frame {
        Frame::from_columns([
            ("continent", Column::Text(vec!["Asia".into(), "Europe".into(), "Asia".into()])),
            ("has_job_experience", Column::Text(vec!["Y".into(), "N".into(), "Y".into()])),
            ("no_of_employees", Column::Numeric(vec![14513.0, 2412.0, 44444.0])),
            ("prevailing_wage", Column::Numeric(vec![592.2, 83425.6, 122996.8])),
            ("case_id", Column::Text(vec!["a".into(), "b".into(), "c".into()])),
        ])
        .unwrap()
    }

    fn preprocessor() -> Preprocessor {
        Preprocessor::new()
            .with_step("oh", ColumnStep::OneHot(OneHotEncoder::new()), vec!["continent".into()])
            .with_step("or", ColumnStep::Ordinal(OrdinalEncoder::new()), vec!["has_job_experience".into()])
            .with_step("pt", ColumnStep::Power(PowerTransformer::new()), vec!["no_of_employees".into()])
            .with_step("ss", ColumnStep::Standard(StandardScaler::new()), vec!["prevailing_wage".into()])
            .with_step("unused", ColumnStep::Standard(StandardScaler::new()), Vec::new())
    }

    #[test]
    fn concatenates_blocks_in_step_order() {
        let (fitted, out) = preprocessor().fit_transform(&frame()).unwrap();
        assert_eq!(out.dim(), (3, 5));
        assert_eq!(fitted.n_features_out(), 5);
        assert_eq!(fitted.step_names(), vec!["oh", "or", "pt", "ss"]);
        assert_eq!(
            fitted.feature_names(),
            vec![
                "continent_Asia",
                "continent_Europe",
                "has_job_experience",
                "no_of_employees",
                "prevailing_wage"
            ]
        );
        assert_eq!(out.row(1).to_vec()[..3], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn persisted_preprocessor_transforms_identically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transformed_object/preprocessing.json");
        let (fitted, out) = preprocessor().fit_transform(&frame()).unwrap();
        fitted.save(&path).unwrap();
        let loaded = FittedPreprocessor::load(&path).unwrap();
        assert_eq!(loaded.transform(&frame()).unwrap(), out);
    }
}
