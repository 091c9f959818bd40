use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::ClassifierError;

/// Hyperparameters of one logistic-regression candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Gradient step size.
    pub learning_rate: f64,
    /// Full-batch passes over the data.
    pub epochs: usize,
    /// L2 penalty on the weights (not the bias).
    #[serde(default)]
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 0.0,
        }
    }
}

impl LogisticParams {
    /// Default search grid.
    #[must_use]
    pub fn default_grid() -> Vec<Self> {
        vec![
            Self::default(),
            Self {
                learning_rate: 0.05,
                epochs: 1000,
                l2: 0.001,
            },
            Self {
                learning_rate: 0.3,
                epochs: 300,
                l2: 0.01,
            },
        ]
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ClassifierError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(ClassifierError::InvalidParams("epochs must be > 0".into()));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(ClassifierError::InvalidParams(format!(
                "l2 must be non-negative, got {}",
                self.l2
            )));
        }
        Ok(())
    }
}

/// Fitted binary logistic regression. Class `1` is the positive class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticParams,
    weights: Array1<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    /// Fits by full-batch gradient descent on the mean log-loss.
    pub fn fit(
        params: LogisticParams,
        features: &Array2<f64>,
        labels: &[usize],
    ) -> Result<Self, ClassifierError> {
        params.validate()?;
        let (rows, cols) = features.dim();
        if rows == 0 {
            return Err(ClassifierError::EmptyData);
        }
        if rows != labels.len() {
            return Err(ClassifierError::LabelMismatch {
                rows,
                labels: labels.len(),
            });
        }
        if let Some(&bad) = labels.iter().find(|&&label| label > 1) {
            return Err(ClassifierError::NonBinaryLabel(bad));
        }
        let targets: Array1<f64> = labels.iter().map(|&label| label as f64).collect();
        let n = rows as f64;
        let mut weights = Array1::<f64>::zeros(cols);
        let mut bias = 0.0;
        for _ in 0..params.epochs {
            let residual = features.dot(&weights).mapv(|z| sigmoid(z + bias)) - &targets;
            let grad_w = features.t().dot(&residual) / n + &weights * params.l2;
            let grad_b = residual.sum() / n;
            weights.scaled_add(-params.learning_rate, &grad_w);
            bias -= params.learning_rate * grad_b;
        }
        Ok(Self {
            params,
            weights,
            bias,
        })
    }

    /// Hyperparameters the model was fitted with.
    #[must_use]
    pub const fn params(&self) -> &LogisticParams {
        &self.params
    }

    /// Number of input features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Probability of class `1` per row.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ClassifierError> {
        if features.ncols() != self.weights.len() {
            return Err(ClassifierError::FeatureMismatch {
                expected: self.weights.len(),
                actual: features.ncols(),
            });
        }
        Ok(features.dot(&self.weights).mapv(|z| sigmoid(z + self.bias)))
    }

    /// Class label per row, thresholded at 0.5.
    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>, ClassifierError> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|&p| usize::from(p >= 0.5))
            .collect())
    }
}
