//! Binary classifier used by the trainer and its model selection.

/// Candidate grid search.
pub mod factory;
/// Gradient-descent logistic regression.
pub mod logistic;
/// Precision, recall and f1.
pub mod metrics;

use thiserror::Error;

pub use factory::{BestModel, ModelFactory};
pub use logistic::{LogisticParams, LogisticRegression};
pub use metrics::ClassificationMetrics;

/// Errors raised while fitting or scoring the classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No rows to fit on.
    #[error("cannot fit a classifier on empty data")]
    EmptyData,
    /// Feature and label counts disagree.
    #[error("{rows} feature rows but {labels} labels")]
    LabelMismatch {
        /// Feature rows.
        rows: usize,
        /// Labels.
        labels: usize,
    },
    /// Feature width differs from the fitted width.
    #[error("expected {expected} features, got {actual}")]
    FeatureMismatch {
        /// Fitted width.
        expected: usize,
        /// Provided width.
        actual: usize,
    },
    /// Labels outside `{0, 1}`.
    #[error("label {0} is not binary")]
    NonBinaryLabel(usize),
    /// Invalid hyperparameters.
    #[error("invalid hyperparameters: {0}")]
    InvalidParams(String),
    /// The factory has no candidates to try.
    #[error("model factory has no candidates")]
    NoCandidates,
}
