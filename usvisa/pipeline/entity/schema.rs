use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::COMPANY_AGE_COLUMN;

/// Errors raised while loading the schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// File could not be read.
    #[error("reading schema {path}: {source}")]
    Io {
        /// Schema path.
        path: String,
        /// Cause.
        source: std::io::Error,
    },
    /// YAML could not be parsed.
    #[error("parsing schema {path}: {source}")]
    Yaml {
        /// Schema path.
        path: String,
        /// Cause.
        source: serde_yaml::Error,
    },
    /// The document declares no columns.
    #[error("schema declares no columns")]
    Empty,
}

/// Declarative description of the raw dataset and its feature groups.
///
/// `columns` keeps the YAML shape of a list of single-entry maps
/// (`- case_id: category`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Raw columns with their declared dtype.
    pub columns: Vec<IndexMap<String, String>>,
    /// Columns expected to hold numbers.
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    /// Columns expected to hold categories.
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    /// Columns removed before preprocessing.
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Nominal columns, one-hot encoded.
    #[serde(default)]
    pub oh_columns: Vec<String>,
    /// Ordered columns, ordinal encoded.
    #[serde(default)]
    pub or_columns: Vec<String>,
    /// Skewed numeric columns, power transformed.
    #[serde(default)]
    pub transform_columns: Vec<String>,
    /// Standard-scaled numeric columns. Derived when omitted.
    #[serde(default)]
    pub num_features: Vec<String>,
}

impl SchemaConfig {
    /// Reads and parses a YAML schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let schema = Self::from_yaml(&raw).map_err(|source| SchemaError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
        if schema.columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(schema)
    }

    /// Parses a YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Declared column names, in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .flat_map(|entry| entry.keys().map(String::as_str))
            .collect()
    }

    /// Number of declared columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.iter().map(IndexMap::len).sum()
    }

    /// Columns handed to the standard scaler.
    ///
    /// Falls back to numerical columns plus `company_age`, minus dropped and
    /// power-transformed columns.
    #[must_use]
    pub fn scaled_columns(&self) -> Vec<String> {
        if !self.num_features.is_empty() {
            return self.num_features.clone();
        }
        self.numerical_columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(COMPANY_AGE_COLUMN))
            .filter(|name| {
                !self.drop_columns.iter().any(|drop| drop == name)
                    && !self.transform_columns.iter().any(|t| t == name)
            })
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r"
columns:
  - case_id: category
  - no_of_employees: int
  - yr_of_estab: int
  - prevailing_wage: float
  - continent: category
numerical_columns:
  - no_of_employees
  - yr_of_estab
  - prevailing_wage
categorical_columns:
  - case_id
  - continent
drop_columns:
  - case_id
  - yr_of_estab
oh_columns:
  - continent
transform_columns:
  - no_of_employees
";

    #[test]
    fn parses_list_of_maps_columns() {
        let schema = SchemaConfig::from_yaml(SCHEMA).unwrap();
        assert_eq!(schema.column_count(), 5);
        assert_eq!(schema.column_names()[3], "prevailing_wage");
        assert!(schema.or_columns.is_empty());
    }

    #[test]
    fn derives_scaled_columns_when_omitted() {
        let schema = SchemaConfig::from_yaml(SCHEMA).unwrap();
        assert_eq!(
            schema.scaled_columns(),
            vec!["prevailing_wage".to_string(), "company_age".to_string()]
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SchemaConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }

    #[test]
    fn shipped_schema_describes_raw_dataset() {
        let schema =
            SchemaConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../config/schema.yaml"))
                .unwrap();
        assert_eq!(schema.column_count(), 12);
        assert_eq!(schema.or_columns.len(), 4);
        assert_eq!(schema.scaled_columns(), vec!["prevailing_wage".to_string()]);
    }
}
