use serde::{Deserialize, Serialize};

/// Typed column storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum Column {
    /// Floating point values.
    Numeric(Vec<f64>),
    /// Free text / categorical values.
    Text(Vec<String>),
}

impl Column {
    /// Number of rows held by the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    /// Returns true when the column holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true for numeric columns.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    /// Infers a column from raw cells: numeric when every cell parses as `f64`.
    #[must_use]
    pub fn infer(cells: Vec<String>) -> Self {
        let parsed: Option<Vec<f64>> = cells
            .iter()
            .map(|cell| cell.trim().parse::<f64>().ok())
            .collect();
        match parsed {
            Some(values) if !cells.is_empty() => Self::Numeric(values),
            _ => Self::Text(cells),
        }
    }

    /// Renders a single cell the way it is written to CSV.
    #[must_use]
    pub fn cell(&self, row: usize) -> String {
        match self {
            Self::Numeric(values) => format_number(values[row]),
            Self::Text(values) => values[row].clone(),
        }
    }

    /// Values as category labels (numbers are rendered to text).
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Numeric(values) => values.iter().copied().map(format_number).collect(),
            Self::Text(values) => values.clone(),
        }
    }

    /// Selects rows by index, preserving order.
    #[must_use]
    pub fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric(values) => Self::Numeric(rows.iter().map(|&idx| values[idx]).collect()),
            Self::Text(values) => Self::Text(rows.iter().map(|&idx| values[idx].clone()).collect()),
        }
    }
}

/// Integers print without a trailing `.0` so round trips keep the raw look.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
