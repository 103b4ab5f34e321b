//! Dataset column metadata
//!
//! The pipeline never hard-codes the housing dataset's column lists. They are
//! supplied through [`ColumnMetadata`], usually as a [`DatasetColumns`] loaded
//! from JSON next to the training data.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

/// Provider of column-name lists and categorical vocabularies.
pub trait ColumnMetadata: Debug + Send + Sync {
    /// Columns carried through encoders untouched.
    fn numeric_column_names(&self) -> Vec<String>;

    /// Two-valued categorical columns.
    fn binary_column_names(&self) -> Vec<String>;

    /// Multi-valued categorical columns.
    fn categorical_column_names(&self) -> Vec<String>;

    /// Column name -> ordered permitted values.
    fn categorical_values_mapping(&self) -> HashMap<String, Vec<String>>;
}

/// Column metadata as plain data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetColumns {
    #[serde(default)]
    pub numeric: Vec<String>,
    #[serde(default)]
    pub binary: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub categories: HashMap<String, Vec<String>>,
}

impl DatasetColumns {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add numeric columns
    pub fn with_numeric<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.numeric.extend(names.into_iter().map(Into::into));
        self
    }

    /// Builder method to add a binary column with its two values
    pub fn with_binary<S: Into<String>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.binary.push(name.to_string());
        self.categories.insert(
            name.to_string(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Builder method to add a categorical column with its vocabulary
    pub fn with_categorical<S: Into<String>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categorical.push(name.to_string());
        self.categories.insert(
            name.to_string(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Parse metadata from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let columns: Self = serde_json::from_str(json)?;
        Ok(columns)
    }

    /// Load metadata from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl ColumnMetadata for DatasetColumns {
    fn numeric_column_names(&self) -> Vec<String> {
        self.numeric.clone()
    }

    fn binary_column_names(&self) -> Vec<String> {
        self.binary.clone()
    }

    fn categorical_column_names(&self) -> Vec<String> {
        self.categorical.clone()
    }

    fn categorical_values_mapping(&self) -> HashMap<String, Vec<String>> {
        self.categories.clone()
    }
}

/// Resolve the vocabulary of every binary and categorical column, in
/// binary-then-categorical order.
pub fn encoded_vocabularies(metadata: &dyn ColumnMetadata) -> Result<Vec<(String, Vec<String>)>> {
    let mut mapping = metadata.categorical_values_mapping();
    metadata
        .binary_column_names()
        .into_iter()
        .chain(metadata.categorical_column_names())
        .map(|name| match mapping.remove(&name) {
            Some(values) if !values.is_empty() => Ok((name, values)),
            Some(_) => Err(PipelineError::invalid_params(
                "categorical-encoder",
                format!("empty vocabulary for column {}", name),
            )),
            None => Err(PipelineError::invalid_params(
                "categorical-encoder",
                format!("no vocabulary for column {}", name),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "numeric": ["LotArea"],
            "binary": ["CentralAir"],
            "categorical": ["MSZoning"],
            "categories": {"CentralAir": ["N", "Y"], "MSZoning": ["RL", "RM", "FV"]}
        }"#;
        let columns = DatasetColumns::from_json_str(json).unwrap();
        assert_eq!(columns.numeric_column_names(), vec!["LotArea"]);
        assert_eq!(columns.categorical_values_mapping()["MSZoning"].len(), 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"numerics": []}"#;
        assert!(DatasetColumns::from_json_str(json).is_err());
    }

    #[test]
    fn test_vocabularies_order() {
        let columns = DatasetColumns::new()
            .with_categorical("MSZoning", ["RL", "RM"])
            .with_binary("CentralAir", ["N", "Y"]);

        let vocab = encoded_vocabularies(&columns).unwrap();
        let names: Vec<&str> = vocab.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["CentralAir", "MSZoning"]);
    }

    #[test]
    fn test_missing_vocabulary() {
        let mut columns = DatasetColumns::new().with_categorical("Street", ["Grvl", "Pave"]);
        columns.categories.clear();

        let err = encoded_vocabularies(&columns).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParams { .. }));
    }
}
