//! Column-wise feature preprocessing fitted on the training frame.
//!
//! Every transformer comes in two states: an unfitted [`Transformer`] holding
//! hyperparameters and a [`FittedTransformer`] holding learned parameters.
//! Fitted states serialize with serde so the whole preprocessor can be stored
//! next to the classifier and reused at prediction time.

/// Column transformer combining the per-group steps.
pub mod column_transformer;
/// One-hot and ordinal encoders.
pub mod encoding;
/// Yeo-Johnson power transform.
pub mod power;
/// Standard scaler.
pub mod scaling;

use ndarray::Array2;
use thiserror::Error;

use crate::frame::{Frame, FrameError};

pub use column_transformer::{FittedPreprocessor, Preprocessor};
pub use encoding::{HandleUnknown, OneHotEncoder, OrdinalEncoder};
pub use power::PowerTransformer;
pub use scaling::StandardScaler;

/// Errors raised while fitting or applying preprocessing steps.
#[derive(Debug, Error)]
pub enum PreprocessingError {
    /// No rows to fit on.
    #[error("cannot fit {0} on empty data")]
    EmptyData(&'static str),
    /// Column lookup or type failure.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Category not seen during fit while unknowns are rejected.
    #[error("unknown category `{value}` in column `{column}`")]
    UnknownCategory {
        /// Column name.
        column: String,
        /// Offending value.
        value: String,
    },
    /// NaN or infinite input.
    #[error("column `{0}` contains non-finite values")]
    NonFinite(String),
    /// Serialized preprocessor could not be read or written.
    #[error("preprocessor serialization failed: {0}")]
    Serialization(String),
}

/// Unfitted transformer applied to a group of named columns.
pub trait Transformer {
    /// Fitted counterpart.
    type Fitted: FittedTransformer;

    /// Learns parameters from `columns` of `frame`.
    fn fit(&self, frame: &Frame, columns: &[String]) -> Result<Self::Fitted, PreprocessingError>;

    /// Fits and transforms in one step.
    fn fit_transform(
        &self,
        frame: &Frame,
        columns: &[String],
    ) -> Result<Array2<f64>, PreprocessingError> {
        self.fit(frame, columns)?.transform(frame)
    }
}

/// Fitted transformer producing a dense block of output features.
pub trait FittedTransformer {
    /// Transforms the fitted columns of `frame` into `(rows, n_features_out)`.
    fn transform(&self, frame: &Frame) -> Result<Array2<f64>, PreprocessingError>;

    /// Number of output features.
    fn n_features_out(&self) -> usize;

    /// Output feature names, e.g. `continent_Asia`.
    fn feature_names(&self) -> Vec<String>;
}

/// Reads a numeric column, rejecting NaN and infinities.
pub(crate) fn finite_column<'a>(
    frame: &'a Frame,
    name: &str,
) -> Result<&'a [f64], PreprocessingError> {
    let values = frame.numeric(name)?;
    if values.iter().any(|value| !value.is_finite()) {
        return Err(PreprocessingError::NonFinite(name.to_string()));
    }
    Ok(values)
}

/// Population mean and standard deviation; zero deviation maps to one.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    (mean, if std > f64::EPSILON { std } else { 1.0 })
}
