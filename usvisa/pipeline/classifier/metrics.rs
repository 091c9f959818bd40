use serde::{Deserialize, Serialize};

use super::ClassifierError;

/// Binary classification scores for the positive class `1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Harmonic mean of precision and recall.
    pub f1_score: f64,
    /// True positives over predicted positives.
    pub precision_score: f64,
    /// True positives over actual positives.
    pub recall_score: f64,
    /// Share of correct predictions.
    pub accuracy: f64,
}

impl ClassificationMetrics {
    /// Scores `predicted` against `actual`. Undefined ratios are reported as 0.
    pub fn evaluate(actual: &[usize], predicted: &[usize]) -> Result<Self, ClassifierError> {
        if actual.len() != predicted.len() {
            return Err(ClassifierError::LabelMismatch {
                rows: predicted.len(),
                labels: actual.len(),
            });
        }
        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        for (&truth, &guess) in actual.iter().zip(predicted) {
            match (truth == 1, guess == 1) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
            if truth == guess {
                correct += 1;
            }
        }
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = ratio(2 * tp, 2 * tp + fp + fn_);
        Ok(Self {
            f1_score: f1,
            precision_score: precision,
            recall_score: recall,
            accuracy: ratio(correct, actual.len()),
        })
    }
}

/// F1 of `predicted` against `actual`.
pub fn f1_score(actual: &[usize], predicted: &[usize]) -> Result<f64, ClassifierError> {
    Ok(ClassificationMetrics::evaluate(actual, predicted)?.f1_score)
}
