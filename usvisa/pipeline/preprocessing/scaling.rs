use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{finite_column, mean_std, FittedTransformer, PreprocessingError, Transformer};
use crate::frame::Frame;

/// Zero-mean unit-variance scaler. Constant columns keep a unit divisor.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardScaler;

impl StandardScaler {
    /// Creates a scaler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Fitted scaler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl FittedStandardScaler {
    /// Learned means.
    #[must_use]
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Learned standard deviations.
    #[must_use]
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }
}

impl Transformer for StandardScaler {
    type Fitted = FittedStandardScaler;

    fn fit(&self, frame: &Frame, columns: &[String]) -> Result<Self::Fitted, PreprocessingError> {
        if frame.n_rows() == 0 {
            return Err(PreprocessingError::EmptyData("StandardScaler"));
        }
        let (means, stds): (Vec<f64>, Vec<f64>) = columns
            .iter()
            .map(|column| finite_column(frame, column).map(mean_std))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unzip();
        Ok(FittedStandardScaler {
            columns: columns.to_vec(),
            means,
            stds,
        })
    }
}

impl FittedTransformer for FittedStandardScaler {
    fn transform(&self, frame: &Frame) -> Result<Array2<f64>, PreprocessingError> {
        let mut out = Array2::zeros((frame.n_rows(), self.columns.len()));
        for (idx, column) in self.columns.iter().enumerate() {
            let values = finite_column(frame, column)?;
            for (row, value) in values.iter().enumerate() {
                out[[row, idx]] = (value - self.means[idx]) / self.stds[idx];
            }
        }
        Ok(out)
    }

    fn n_features_out(&self) -> usize {
        self.columns.len()
    }

    fn feature_names(&self) -> Vec<String> {
        self.columns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    #[test]
    fn scales_with_train_statistics() {
        let train = Frame::from_columns([(
            "prevailing_wage",
            Column::Numeric(vec![1.0, 2.0, 3.0, 4.0]),
        )])
        .unwrap();
        let columns = vec!["prevailing_wage".to_string()];
        let fitted = StandardScaler::new().fit(&train, &columns).unwrap();
        assert!((fitted.means()[0] - 2.5).abs() < 1e-12);

        let test = Frame::from_columns([("prevailing_wage", Column::Numeric(vec![2.5]))]).unwrap();
        assert_eq!(fitted.transform(&test).unwrap()[[0, 0]], 0.0);
    }

    #[test]
    fn constant_column_is_centered_only() {
        let frame = Frame::from_columns([("c", Column::Numeric(vec![7.0, 7.0]))]).unwrap();
        let fitted = StandardScaler::new().fit(&frame, &["c".to_string()]).unwrap();
        assert_eq!(fitted.stds()[0], 1.0);
        assert_eq!(fitted.transform(&frame).unwrap().column(0).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn rejects_nan() {
        let frame = Frame::from_columns([("c", Column::Numeric(vec![1.0, f64::NAN]))]).unwrap();
        assert!(matches!(
            StandardScaler::new().fit(&frame, &["c".to_string()]),
            Err(PreprocessingError::NonFinite(_))
        ));
    }
}
