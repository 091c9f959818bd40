//! Minimal column-oriented table used between pipeline stages.

/// Typed column storage.
pub mod column;

use std::{fs::File, io::BufReader, path::Path};

use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use thiserror::Error;

pub use column::Column;

/// Errors raised while building, reading or slicing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Requested column does not exist.
    #[error("column `{0}` not found")]
    MissingColumn(String),
    /// Column exists but holds text where numbers were expected.
    #[error("column `{0}` is not numeric")]
    NotNumeric(String),
    /// Column length differs from the frame's row count.
    #[error("column `{name}` has {actual} rows, frame has {expected}")]
    LengthMismatch {
        /// Column name.
        name: String,
        /// Frame row count.
        expected: usize,
        /// Column row count.
        actual: usize,
    },
    /// Column name used twice.
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
    /// CSV layer failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered collection of equally long named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: IndexMap<String, Column>,
    rows: usize,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a frame from `(name, column)` pairs.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, column) in columns {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    /// Appends a new column.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), FrameError> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(FrameError::DuplicateColumn(name));
        }
        self.check_len(&name, &column)?;
        self.rows = column.len();
        self.columns.insert(name, column);
        Ok(())
    }

    /// Inserts or replaces a column, keeping its position when it exists.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), FrameError> {
        let name = name.into();
        self.check_len(&name, &column)?;
        self.rows = column.len();
        self.columns.insert(name, column);
        Ok(())
    }

    fn check_len(&self, name: &str, column: &Column) -> Result<(), FrameError> {
        if !self.columns.is_empty() && column.len() != self.rows {
            return Err(FrameError::LengthMismatch {
                name: name.to_string(),
                expected: self.rows,
                actual: column.len(),
            });
        }
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Returns true when the column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Borrows a column.
    pub fn column(&self, name: &str) -> Result<&Column, FrameError> {
        self.columns
            .get(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    /// Borrows a numeric column.
    pub fn numeric(&self, name: &str) -> Result<&[f64], FrameError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Text(_) => Err(FrameError::NotNumeric(name.to_string())),
        }
    }

    /// Removes a column and returns it.
    pub fn remove_column(&mut self, name: &str) -> Result<Column, FrameError> {
        let column = self
            .columns
            .shift_remove(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))?;
        if self.columns.is_empty() {
            self.rows = 0;
        }
        Ok(column)
    }

    /// Copy of the frame without the listed columns. Every name must exist.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, FrameError> {
        let mut frame = self.clone();
        for name in names {
            frame.remove_column(name.as_ref())?;
        }
        frame.rows = self.rows;
        Ok(frame)
    }

    /// Copy of the frame restricted to the given row indices.
    #[must_use]
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.take(rows)))
                .collect(),
            rows: rows.len(),
        }
    }

    /// Reads a headed CSV file, inferring each column's type.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        let file = File::open(path.as_ref())?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(BufReader::new(file));
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (idx, cell) in record.iter().enumerate().take(headers.len()) {
                cells[idx].push(cell.to_string());
            }
        }
        let mut frame = Self::new();
        for (name, values) in headers.into_iter().zip(cells) {
            frame.push_column(name, Column::infer(values))?;
        }
        Ok(frame)
    }

    /// Writes the frame as a headed CSV file, creating parent directories.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), FrameError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(path)?;
        writer.write_record(self.columns.keys())?;
        for row in 0..self.rows {
            writer.write_record(self.columns.values().map(|column| column.cell(row)))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small() -> Frame {
        Frame::from_columns([
            ("case_id", Column::Text(vec!["EZYV01".into(), "EZYV02".into()])),
            ("yr_of_estab", Column::Numeric(vec![2007.0, 2002.0])),
            ("prevailing_wage", Column::Numeric(vec![592.2029, 83425.65])),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let mut frame = small();
        let err = frame
            .push_column("extra", Column::Numeric(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { expected: 2, .. }));
    }

    #[test]
    fn csv_round_trip_keeps_types_and_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/frame.csv");
        small().write_csv(&path).unwrap();
        let loaded = Frame::read_csv(&path).unwrap();
        assert_eq!(
            loaded.column_names().collect::<Vec<_>>(),
            vec!["case_id", "yr_of_estab", "prevailing_wage"]
        );
        assert_eq!(loaded.numeric("yr_of_estab").unwrap(), &[2007.0, 2002.0]);
        assert!(matches!(loaded.numeric("case_id"), Err(FrameError::NotNumeric(_))));
    }

    #[test]
    fn drop_and_take() {
        let frame = small();
        let dropped = frame.drop_columns(&["case_id"]).unwrap();
        assert_eq!(dropped.n_cols(), 2);
        assert_eq!(dropped.n_rows(), 2);
        assert!(matches!(
            frame.drop_columns(&["missing"]),
            Err(FrameError::MissingColumn(_))
        ));
        let taken = frame.take_rows(&[1]);
        assert_eq!(taken.n_rows(), 1);
        assert_eq!(taken.numeric("yr_of_estab").unwrap(), &[2002.0]);
    }
}
