use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    classifier::LogisticRegression,
    error::{PipelineError, PipelineResult, Stage, StageResultExt},
    frame::Frame,
    preprocessing::FittedPreprocessor,
};

/// Outcome of a visa application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaseStatus {
    /// Application approved.
    Certified,
    /// Application refused.
    Denied,
}

impl CaseStatus {
    /// Both statuses in label order.
    pub const ALL: [Self; 2] = [Self::Certified, Self::Denied];

    /// Label as written in the dataset.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Certified => "Certified",
            Self::Denied => "Denied",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Certified" => Ok(Self::Certified),
            "Denied" => Ok(Self::Denied),
            other => Err(PipelineError::UnknownLabel {
                column: crate::constants::TARGET_COLUMN.to_string(),
                label: other.to_string(),
            }),
        }
    }
}

/// Fixed mapping between [`CaseStatus`] and its integer encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetValueMapping;

impl TargetValueMapping {
    /// Integer code of a status.
    #[must_use]
    pub const fn encode(status: CaseStatus) -> usize {
        match status {
            CaseStatus::Certified => 0,
            CaseStatus::Denied => 1,
        }
    }

    /// Status of an integer code.
    #[must_use]
    pub const fn decode(code: usize) -> Option<CaseStatus> {
        match code {
            0 => Some(CaseStatus::Certified),
            1 => Some(CaseStatus::Denied),
            _ => None,
        }
    }

    /// Label-to-code mapping.
    #[must_use]
    pub fn as_dict() -> BTreeMap<CaseStatus, usize> {
        CaseStatus::ALL
            .into_iter()
            .map(|status| (status, Self::encode(status)))
            .collect()
    }

    /// Code-to-label mapping, the exact inverse of [`Self::as_dict`].
    #[must_use]
    pub fn reverse_mapping() -> BTreeMap<usize, CaseStatus> {
        Self::as_dict()
            .into_iter()
            .map(|(status, code)| (code, status))
            .collect()
    }

    /// Encodes a label column.
    pub fn encode_labels(labels: &[String]) -> PipelineResult<Vec<usize>> {
        labels
            .iter()
            .map(|label| label.parse::<CaseStatus>().map(Self::encode))
            .collect()
    }
}

/// Published model: fitted preprocessor plus classifier, scoring raw frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisaModel {
    preprocessor: FittedPreprocessor,
    classifier: LogisticRegression,
}

impl VisaModel {
    /// Bundles a fitted preprocessor and classifier.
    #[must_use]
    pub const fn new(preprocessor: FittedPreprocessor, classifier: LogisticRegression) -> Self {
        Self {
            preprocessor,
            classifier,
        }
    }

    /// Fitted preprocessor.
    #[must_use]
    pub const fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    /// Fitted classifier.
    #[must_use]
    pub const fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    /// Integer class codes for each row of a raw feature frame.
    pub fn predict(&self, frame: &Frame) -> PipelineResult<Vec<usize>> {
        let features = self.preprocessor.transform(frame).stage(Stage::Prediction)?;
        self.classifier.predict(&features).stage(Stage::Prediction)
    }

    /// Decoded statuses for each row of a raw feature frame.
    pub fn predict_status(&self, frame: &Frame) -> PipelineResult<Vec<CaseStatus>> {
        let reverse = TargetValueMapping::reverse_mapping();
        self.predict(frame)?
            .into_iter()
            .map(|code| {
                reverse
                    .get(&code)
                    .copied()
                    .ok_or_else(|| PipelineError::UnknownLabel {
                        column: crate::constants::TARGET_COLUMN.to_string(),
                        label: code.to_string(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_a_bijection() {
        let forward = TargetValueMapping::as_dict();
        assert_eq!(forward[&CaseStatus::Certified], 0);
        assert_eq!(forward[&CaseStatus::Denied], 1);
        let reverse = TargetValueMapping::reverse_mapping();
        assert_eq!(reverse.len(), forward.len());
        for (status, code) in forward {
            assert_eq!(reverse[&code], status);
            assert_eq!(TargetValueMapping::decode(code), Some(status));
        }
        assert_eq!(TargetValueMapping::decode(2), None);
    }

    #[test]
    fn encodes_label_column() {
        let labels = vec!["Denied".to_string(), "Certified".to_string()];
        assert_eq!(TargetValueMapping::encode_labels(&labels).unwrap(), vec![1, 0]);
        let bad = vec!["Withdrawn".to_string()];
        assert!(matches!(
            TargetValueMapping::encode_labels(&bad),
            Err(PipelineError::UnknownLabel { .. })
        ));
    }
}
