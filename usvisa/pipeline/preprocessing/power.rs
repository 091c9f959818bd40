use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{finite_column, mean_std, FittedTransformer, PreprocessingError, Transformer};
use crate::frame::Frame;

const LAMBDA_BOUNDS: (f64, f64) = (-5.0, 5.0);
const GOLDEN_ITERATIONS: usize = 120;

/// Yeo-Johnson power transform with maximum-likelihood lambda per column,
/// followed by zero-mean unit-variance standardization.
#[derive(Clone, Copy, Debug)]
pub struct PowerTransformer {
    standardize: bool,
}

impl Default for PowerTransformer {
    fn default() -> Self {
        Self { standardize: true }
    }
}

impl PowerTransformer {
    /// Creates a standardizing transformer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the trailing standardization.
    #[must_use]
    pub const fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }
}

/// Fitted Yeo-Johnson transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedPowerTransformer {
    columns: Vec<String>,
    lambdas: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    standardize: bool,
}

impl FittedPowerTransformer {
    /// Fitted lambda per column.
    #[must_use]
    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }
}

impl Transformer for PowerTransformer {
    type Fitted = FittedPowerTransformer;

    fn fit(&self, frame: &Frame, columns: &[String]) -> Result<Self::Fitted, PreprocessingError> {
        if frame.n_rows() == 0 {
            return Err(PreprocessingError::EmptyData("PowerTransformer"));
        }
        let mut lambdas = Vec::with_capacity(columns.len());
        let mut means = Vec::with_capacity(columns.len());
        let mut stds = Vec::with_capacity(columns.len());
        for column in columns {
            let values = finite_column(frame, column)?;
            let lambda = fit_lambda(values);
            let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();
            let (mean, std) = if self.standardize {
                mean_std(&transformed)
            } else {
                (0.0, 1.0)
            };
            lambdas.push(lambda);
            means.push(mean);
            stds.push(std);
        }
        Ok(FittedPowerTransformer {
            columns: columns.to_vec(),
            lambdas,
            means,
            stds,
            standardize: self.standardize,
        })
    }
}

impl FittedTransformer for FittedPowerTransformer {
    fn transform(&self, frame: &Frame) -> Result<Array2<f64>, PreprocessingError> {
        let mut out = Array2::zeros((frame.n_rows(), self.columns.len()));
        for (idx, column) in self.columns.iter().enumerate() {
            let values = finite_column(frame, column)?;
            for (row, &x) in values.iter().enumerate() {
                out[[row, idx]] = (yeo_johnson(x, self.lambdas[idx]) - self.means[idx]) / self.stds[idx];
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

/// Yeo-Johnson transform of a single value.
#[must_use]
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    const EPS: f64 = 1e-12;
    if x >= 0.0 {
        if lambda.abs() < EPS {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < EPS {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Profile log-likelihood of the Yeo-Johnson transform at `lambda`.
fn log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();
    let mean = transformed.iter().sum::<f64>() / n;
    let var = transformed.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if !var.is_finite() || var <= f64::MIN_POSITIVE {
        return f64::NEG_INFINITY;
    }
    let jacobian: f64 = values.iter().map(|&x| x.signum() * x.abs().ln_1p()).sum();
    -0.5 * n * var.ln() + (lambda - 1.0) * jacobian
}

/// Golden-section search for the lambda maximizing the log-likelihood.
fn fit_lambda(values: &[f64]) -> f64 {
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut lo, mut hi) = LAMBDA_BOUNDS;
    let mut c = hi - inv_phi * (hi - lo);
    let mut d = lo + inv_phi * (hi - lo);
    let mut fc = log_likelihood(values, c);
    let mut fd = log_likelihood(values, d);
    for _ in 0..GOLDEN_ITERATIONS {
        if fc >= fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - inv_phi * (hi - lo);
            fc = log_likelihood(values, c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + inv_phi * (hi - lo);
            fd = log_likelihood(values, d);
        }
    }
    (lo + hi) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    #[test]
    fn yeo_johnson_special_cases() {
        assert!((yeo_johnson(3.0, 1.0) - 3.0).abs() < 1e-12);
        assert!((yeo_johnson(-3.0, 1.0) + 3.0).abs() < 1e-12);
        assert!((yeo_johnson(1.0, 0.0) - 2f64.ln()).abs() < 1e-12);
        assert!((yeo_johnson(-1.0, 2.0) + 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn reduces_skew_and_standardizes() {
        let skewed: Vec<f64> = (1..=200).map(|i| f64::from(i).powi(3)).collect();
        let frame = Frame::from_columns([("no_of_employees", Column::Numeric(skewed))]).unwrap();
        let columns = vec!["no_of_employees".to_string()];
        let fitted = PowerTransformer::new().fit(&frame, &columns).unwrap();
        assert!(fitted.lambdas()[0] < 1.0);
        let out = fitted.transform(&frame).unwrap();
        let col = out.column(0);
        let mean = col.sum() / col.len() as f64;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_text_columns() {
        let frame = Frame::from_columns([("unit_of_wage", Column::Text(vec!["Hour".into()]))]).unwrap();
        let err = PowerTransformer::new()
            .fit(&frame, &["unit_of_wage".to_string()])
            .unwrap_err();
        assert!(matches!(err, PreprocessingError::Frame(_)));
    }
}
