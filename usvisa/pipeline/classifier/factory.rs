use ndarray::Array2;

use super::{ClassificationMetrics, ClassifierError, LogisticParams, LogisticRegression};

/// Fitted winner of a grid search.
#[derive(Debug, Clone)]
pub struct BestModel {
    /// Fitted classifier.
    pub model: LogisticRegression,
    /// Scores on the evaluation split.
    pub metrics: ClassificationMetrics,
}

/// Fits every candidate and keeps the one with the highest test f1.
#[derive(Debug, Clone)]
pub struct ModelFactory {
    candidates: Vec<LogisticParams>,
}

impl Default for ModelFactory {
    fn default() -> Self {
        Self::new(LogisticParams::default_grid())
    }
}

impl ModelFactory {
    /// Creates a factory over the given grid.
    #[must_use]
    pub fn new(candidates: Vec<LogisticParams>) -> Self {
        Self { candidates }
    }

    /// Candidate grid.
    #[must_use]
    pub fn candidates(&self) -> &[LogisticParams] {
        &self.candidates
    }

    /// Runs the search. Ties keep the earlier candidate.
    pub fn best_model(
        &self,
        x_train: &Array2<f64>,
        y_train: &[usize],
        x_test: &Array2<f64>,
        y_test: &[usize],
    ) -> Result<BestModel, ClassifierError> {
        let mut best: Option<BestModel> = None;
        for params in &self.candidates {
            let model = LogisticRegression::fit(*params, x_train, y_train)?;
            let predicted = model.predict(x_test)?;
            let metrics = ClassificationMetrics::evaluate(y_test, &predicted)?;
            if best
                .as_ref()
                .map_or(true, |current| metrics.f1_score > current.metrics.f1_score)
            {
                best = Some(BestModel { model, metrics });
            }
        }
        best.ok_or(ClassifierError::NoCandidates)
    }
}
