use std::collections::BTreeSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{FittedTransformer, PreprocessingError, Transformer};
use crate::frame::Frame;

/// Strategy for categories that were not seen during fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    /// Fail the transform.
    #[default]
    Error,
    /// One-hot: emit an all-zero block. Ordinal: emit `-1`.
    Ignore,
}

/// Learns the sorted category set of each column.
fn fit_categories(
    frame: &Frame,
    columns: &[String],
    name: &'static str,
) -> Result<Vec<Vec<String>>, PreprocessingError> {
    if frame.n_rows() == 0 {
        return Err(PreprocessingError::EmptyData(name));
    }
    columns
        .iter()
        .map(|column| {
            let labels = frame.column(column)?.labels();
            Ok(labels
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect())
        })
        .collect()
}

/// One-hot encoder for nominal columns.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneHotEncoder {
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    /// Creates an encoder that rejects unknown categories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unknown-category strategy.
    #[must_use]
    pub const fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }
}

/// Fitted one-hot encoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedOneHotEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    handle_unknown: HandleUnknown,
}

impl FittedOneHotEncoder {
    /// Sorted categories per input column.
    #[must_use]
    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }
}

impl Transformer for OneHotEncoder {
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, frame: &Frame, columns: &[String]) -> Result<Self::Fitted, PreprocessingError> {
        Ok(FittedOneHotEncoder {
            columns: columns.to_vec(),
            categories: fit_categories(frame, columns, "OneHotEncoder")?,
            handle_unknown: self.handle_unknown,
        })
    }
}

impl FittedTransformer for FittedOneHotEncoder {
    fn transform(&self, frame: &Frame) -> Result<Array2<f64>, PreprocessingError> {
        let mut out = Array2::zeros((frame.n_rows(), self.n_features_out()));
        let mut offset = 0;
        for (column, categories) in self.columns.iter().zip(&self.categories) {
            let labels = frame.column(column)?.labels();
            for (row, label) in labels.iter().enumerate() {
                match categories.binary_search(label) {
                    Ok(idx) => out[[row, offset + idx]] = 1.0,
                    Err(_) if self.handle_unknown == HandleUnknown::Ignore => {}
                    Err(_) => {
                        return Err(PreprocessingError::UnknownCategory {
                            column: column.clone(),
                            value: label.clone(),
                        })
                    }
                }
            }
            offset += categories.len();
        }
        Ok(out)
    }

    fn n_features_out(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(column, categories)| {
                categories
                    .iter()
                    .map(move |category| format!("{column}_{category}"))
            })
            .collect()
    }
}

/// Ordinal encoder mapping each category to its rank in sorted order.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdinalEncoder {
    handle_unknown: HandleUnknown,
}

impl OrdinalEncoder {
    /// Creates an encoder that rejects unknown categories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unknown-category strategy.
    #[must_use]
    pub const fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }
}

/// Fitted ordinal encoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedOrdinalEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    handle_unknown: HandleUnknown,
}

impl Transformer for OrdinalEncoder {
    type Fitted = FittedOrdinalEncoder;

    fn fit(&self, frame: &Frame, columns: &[String]) -> Result<Self::Fitted, PreprocessingError> {
        Ok(FittedOrdinalEncoder {
            columns: columns.to_vec(),
            categories: fit_categories(frame, columns, "OrdinalEncoder")?,
            handle_unknown: self.handle_unknown,
        })
    }
}

impl FittedTransformer for FittedOrdinalEncoder {
    fn transform(&self, frame: &Frame) -> Result<Array2<f64>, PreprocessingError> {
        let mut out = Array2::zeros((frame.n_rows(), self.columns.len()));
        for (col_idx, (column, categories)) in self.columns.iter().zip(&self.categories).enumerate()
        {
            let labels = frame.column(column)?.labels();
            for (row, label) in labels.iter().enumerate() {
                out[[row, col_idx]] = match categories.binary_search(label) {
                    Ok(rank) => rank as f64,
                    Err(_) if self.handle_unknown == HandleUnknown::Ignore => -1.0,
                    Err(_) => {
                        return Err(PreprocessingError::UnknownCategory {
                            column: column.clone(),
                            value: label.clone(),
                        })
                    }
                };
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

    fn frame(values: &[&str]) -> Frame {
        Frame::from_columns([(
            "continent",
            Column::Text(values.iter().map(|v| (*v).to_string()).collect()),
        )])
        .unwrap()
    }

    fn cols() -> Vec<String> {
        vec!["continent".to_string()]
    }

    #[test]
    fn one_hot_encodes_sorted_categories() {
        let train = frame(&["Europe", "Asia", "Europe"]);
        let fitted = OneHotEncoder::new().fit(&train, &cols()).unwrap();
        assert_eq!(fitted.feature_names(), vec!["continent_Asia", "continent_Europe"]);
        let out = fitted.transform(&train).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn one_hot_unknown_handling() {
        let train = frame(&["Asia", "Europe"]);
        let unseen = frame(&["Africa"]);
        let strict = OneHotEncoder::new().fit(&train, &cols()).unwrap();
        assert!(matches!(
            strict.transform(&unseen),
            Err(PreprocessingError::UnknownCategory { .. })
        ));
        let lenient = OneHotEncoder::new()
            .with_handle_unknown(HandleUnknown::Ignore)
            .fit(&train, &cols())
            .unwrap();
        assert_eq!(lenient.transform(&unseen).unwrap().row(0).sum(), 0.0);
    }

    #[test]
    fn ordinal_ranks_and_ignores() {
        let train = frame(&["N", "Y", "N"]);
        let fitted = OrdinalEncoder::new()
            .with_handle_unknown(HandleUnknown::Ignore)
            .fit(&train, &cols())
            .unwrap();
        let out = fitted.transform(&frame(&["Y", "N", "?"])).unwrap();
        assert_eq!(out.column(0).to_vec(), vec![1.0, 0.0, -1.0]);
    }

    #[test]
    fn fit_rejects_empty_frame() {
        let empty = frame(&[]);
        assert!(matches!(
            OneHotEncoder::new().fit(&empty, &cols()),
            Err(PreprocessingError::EmptyData(_))
        ));
    }
}
