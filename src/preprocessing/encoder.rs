//! Categorical encoding against fixed vocabularies

use crate::config::{parse_params, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::Transformer;
use crate::frame::{
    f64_values, float_column, indicator_column, require_column, require_columns, string_values,
};
use crate::metadata::{encoded_vocabularies, ColumnMetadata};
use ndarray::Array1;
use polars::prelude::*;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// How categorical columns are turned into numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryEncoding {
    /// One indicator column per category, first category dropped
    OneHot { dense: bool },
    /// Vocabulary index of the value
    Ordinal,
}

/// Parameters of the `categorical-encoder` stage
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoricalEncoderParams {
    #[serde(default)]
    pub one_hot: bool,
    #[serde(default)]
    pub force_dense_array: bool,
    #[serde(default)]
    pub pass_through_columns: Option<Vec<String>>,
}

/// A column's permitted values and their codes.
#[derive(Debug, Clone)]
struct Vocabulary {
    column: String,
    values: Vec<String>,
    codes: HashMap<String, usize>,
}

impl Vocabulary {
    fn new(column: String, values: Vec<String>) -> Self {
        let codes = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        Self { column, values, codes }
    }

    /// Code of every row; a null or out-of-vocabulary value is an error.
    fn encode(&self, df: &DataFrame) -> Result<Vec<usize>> {
        category_values(df, &self.column)?
            .into_iter()
            .map(|value| {
                value
                    .as_ref()
                    .and_then(|v| self.codes.get(v))
                    .copied()
                    .ok_or_else(|| PipelineError::UnknownColumnCategory {
                        column: self.column.clone(),
                        value: value.unwrap_or_else(|| "null".to_string()),
                    })
            })
            .collect()
    }
}

/// Row values in the form vocabularies use. Integral floats drop their
/// fraction so a code column read as Float64 matches `"20"`, not `"20.0"`.
fn category_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if !require_column(df, name)?.dtype().is_float() {
        return string_values(df, name);
    }
    Ok(f64_values(df, name)?
        .into_iter()
        .map(|v| {
            v.map(|v| {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    format!("{}", v as i64)
                } else {
                    v.to_string()
                }
            })
        })
        .collect())
}

/// State recorded by `fit`
#[derive(Debug, Clone)]
struct EncoderLayout {
    pass_through: Vec<String>,
    n_features_in: usize,
}

/// Encodes the dataset's binary and categorical columns with vocabularies
/// fixed by the column metadata, carries numeric columns through, and drops
/// everything else.
///
/// Because vocabularies never come from the fit batch, the output width and
/// column order are the same for every batch.
///
/// Values are matched by their string form. Float columns holding whole
/// numbers are matched in integer form, so `20.0` encodes as `"20"`.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    one_hot: bool,
    force_dense_array: bool,
    pass_through_columns: Option<Vec<String>>,
    metadata: Arc<dyn ColumnMetadata>,
    vocabularies: Vec<Vocabulary>,
    layout: Option<EncoderLayout>,
}

impl CategoricalEncoder {
    /// Create an ordinal encoder over the metadata's categorical columns.
    ///
    /// Fails if a binary or categorical column has no vocabulary.
    pub fn new(metadata: Arc<dyn ColumnMetadata>) -> Result<Self> {
        let vocabularies = encoded_vocabularies(metadata.as_ref())?
            .into_iter()
            .map(|(column, values)| Vocabulary::new(column, values))
            .collect();

        Ok(Self {
            one_hot: false,
            force_dense_array: false,
            pass_through_columns: None,
            metadata,
            vocabularies,
            layout: None,
        })
    }

    /// Construct from `categorical-encoder` config params
    pub fn from_params(
        estimator: &str,
        params: &Params,
        metadata: Arc<dyn ColumnMetadata>,
    ) -> Result<Self> {
        let p: CategoricalEncoderParams = parse_params(estimator, params)?;
        let mut encoder = Self::new(metadata)?
            .with_one_hot(p.one_hot)
            .with_force_dense_array(p.force_dense_array);
        if let Some(columns) = p.pass_through_columns {
            encoder = encoder.with_pass_through_columns(columns);
        }
        Ok(encoder)
    }

    pub fn with_one_hot(mut self, one_hot: bool) -> Self {
        self.one_hot = one_hot;
        self
    }

    /// Emit Float64 indicators instead of Boolean ones (one-hot only)
    pub fn with_force_dense_array(mut self, dense: bool) -> Self {
        self.force_dense_array = dense;
        self
    }

    /// Extra columns to carry through besides the metadata's numeric ones
    pub fn with_pass_through_columns(mut self, columns: Vec<String>) -> Self {
        self.pass_through_columns = Some(columns);
        self
    }

    pub fn encoding(&self) -> CategoryEncoding {
        if self.one_hot {
            CategoryEncoding::OneHot {
                dense: self.force_dense_array,
            }
        } else {
            CategoryEncoding::Ordinal
        }
    }

    /// Number of columns seen during fit
    pub fn n_features_in(&self) -> Option<usize> {
        self.layout.as_ref().map(|l| l.n_features_in)
    }

    /// Number of columns `transform` produces
    pub fn n_features_out(&self) -> Option<usize> {
        let layout = self.layout.as_ref()?;
        let encoded: usize = match self.encoding() {
            CategoryEncoding::OneHot { .. } => self
                .vocabularies
                .iter()
                .map(|v| v.values.len().saturating_sub(1))
                .sum(),
            CategoryEncoding::Ordinal => self.vocabularies.len(),
        };
        Some(encoded + layout.pass_through.len())
    }

    fn encode_column(&self, vocab: &Vocabulary, codes: &[usize], out: &mut Vec<Column>) {
        match self.encoding() {
            CategoryEncoding::OneHot { dense } => {
                for (j, value) in vocab.values.iter().enumerate().skip(1) {
                    let name = format!("{}_{}", vocab.column, value);
                    let indicators = codes.iter().map(|&c| c == j).collect();
                    out.push(indicator_column(&name, indicators, dense));
                }
            }
            CategoryEncoding::Ordinal => {
                let values = codes.iter().map(|&c| Some(c as f64)).collect();
                out.push(float_column(&vocab.column, values));
            }
        }
    }
}

impl Transformer for CategoricalEncoder {
    fn fit(&mut self, x: &DataFrame, _y: Option<&Array1<f64>>) -> Result<()> {
        let categorical: Vec<&str> = self.vocabularies.iter().map(|v| v.column.as_str()).collect();

        // numeric names first, then extras; repeats keep their first position
        let mut seen = HashSet::new();
        let mut pass_through = Vec::new();
        let extra = self.pass_through_columns.iter().flatten().cloned();
        for name in self.metadata.numeric_column_names().into_iter().chain(extra) {
            if categorical.contains(&name.as_str()) {
                return Err(PipelineError::invalid_params(
                    "categorical-encoder",
                    format!("pass-through column {} is also an encoded column", name),
                ));
            }
            if seen.insert(name.clone()) {
                pass_through.push(name);
            }
        }

        require_columns(x, &categorical)?;
        require_columns(x, &pass_through)?;

        for vocab in &self.vocabularies {
            vocab.encode(x)?;
        }

        debug!(
            categorical = self.vocabularies.len(),
            pass_through = pass_through.len(),
            encoding = ?self.encoding(),
            "Fitted categorical encoder"
        );

        self.layout = Some(EncoderLayout {
            pass_through,
            n_features_in: x.width(),
        });
        Ok(())
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("CategoricalEncoder".to_string()))?;
        if x.width() != layout.n_features_in {
            return Err(PipelineError::FeatureMismatch {
                expected: layout.n_features_in,
                actual: x.width(),
            });
        }

        let mut columns = Vec::new();
        for vocab in &self.vocabularies {
            let codes = vocab.encode(x)?;
            self.encode_column(vocab, &codes, &mut columns);
        }
        for name in &layout.pass_through {
            columns.push(float_column(name, f64_values(x, name)?));
        }

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{column_names, to_matrix};
    use crate::metadata::DatasetColumns;

    fn metadata() -> Arc<dyn ColumnMetadata> {
        Arc::new(
            DatasetColumns::new()
                .with_numeric(["LotArea"])
                .with_binary("CentralAir", ["N", "Y"])
                .with_categorical("MSZoning", ["RL", "RM", "FV"]),
        )
    }

    fn full_df() -> DataFrame {
        df!(
            "LotArea" => &[8450i64, 9600, 11250],
            "CentralAir" => &["Y", "N", "Y"],
            "MSZoning" => &["RL", "RM", "FV"],
            "Street" => &["Pave", "Pave", "Grvl"],
        )
        .unwrap()
    }

    fn subset_df() -> DataFrame {
        df!(
            "LotArea" => &[7000i64],
            "CentralAir" => &["Y"],
            "MSZoning" => &["RM"],
            "Street" => &["Pave"],
        )
        .unwrap()
    }

    #[test]
    fn test_ordinal_encoding() {
        let mut encoder = CategoricalEncoder::new(metadata()).unwrap();
        let result = encoder.fit_transform(&full_df(), None).unwrap();

        assert_eq!(column_names(&result), vec!["CentralAir", "MSZoning", "LotArea"]);
        let x = to_matrix(&result).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![1.0, 0.0, 8450.0]);
        assert_eq!(x.row(2).to_vec(), vec![1.0, 2.0, 11250.0]);
    }

    #[test]
    fn test_one_hot_drops_first_category() {
        let mut encoder = CategoricalEncoder::new(metadata()).unwrap().with_one_hot(true);
        let result = encoder.fit_transform(&full_df(), None).unwrap();

        assert_eq!(
            column_names(&result),
            vec!["CentralAir_Y", "MSZoning_RM", "MSZoning_FV", "LotArea"]
        );
        assert_eq!(result.column("MSZoning_RM").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(encoder.n_features_out(), Some(4));
    }

    #[test]
    fn test_force_dense() {
        let mut encoder = CategoricalEncoder::new(metadata())
            .unwrap()
            .with_one_hot(true)
            .with_force_dense_array(true);
        let result = encoder.fit_transform(&full_df(), None).unwrap();

        assert_eq!(result.column("CentralAir_Y").unwrap().dtype(), &DataType::Float64);
        let x = to_matrix(&result).unwrap();
        assert_eq!(x.row(1).to_vec(), vec![0.0, 1.0, 0.0, 9600.0]);
    }

    #[test]
    fn test_fixed_width_across_batches() {
        let mut encoder = CategoricalEncoder::new(metadata()).unwrap().with_one_hot(true);
        encoder.fit(&full_df(), None).unwrap();

        let full = encoder.transform(&full_df()).unwrap();
        let subset = encoder.transform(&subset_df()).unwrap();
        assert_eq!(full.width(), subset.width());
        assert_eq!(column_names(&full), column_names(&subset));

        // fitting on a batch that lacks some categories changes nothing
        let mut other = CategoricalEncoder::new(metadata()).unwrap().with_one_hot(true);
        other.fit(&subset_df(), None).unwrap();
        assert_eq!(other.transform(&full_df()).unwrap().width(), full.width());
    }

    #[test]
    fn test_unknown_category() {
        let mut encoder = CategoricalEncoder::new(metadata()).unwrap();
        encoder.fit(&full_df(), None).unwrap();

        let bad = df!(
            "LotArea" => &[1i64],
            "CentralAir" => &["Y"],
            "MSZoning" => &["C (all)"],
            "Street" => &["Pave"],
        )
        .unwrap();
        let err = encoder.transform(&bad).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnknownColumnCategory { column, value }
                if column == "MSZoning" && value == "C (all)"
        ));
    }

    #[test]
    fn test_unknown_category_at_fit() {
        let mut encoder = CategoricalEncoder::new(metadata()).unwrap();
        let bad = df!(
            "LotArea" => &[1i64],
            "CentralAir" => &["maybe"],
            "MSZoning" => &["RL"],
            "Street" => &["Pave"],
        )
        .unwrap();
        assert!(matches!(
            encoder.fit(&bad, None),
            Err(PipelineError::UnknownColumnCategory { .. })
        ));
    }

    #[test]
    fn test_pass_through_columns() {
        let df = full_df()
            .lazy()
            .with_column(lit(1.5).alias("HouseAge"))
            .collect()
            .unwrap();
        let mut encoder = CategoricalEncoder::new(metadata())
            .unwrap()
            .with_pass_through_columns(vec!["HouseAge".to_string()]);
        let result = encoder.fit_transform(&df, None).unwrap();

        assert_eq!(
            column_names(&result),
            vec!["CentralAir", "MSZoning", "LotArea", "HouseAge"]
        );
    }

    #[test]
    fn test_repeated_pass_through_column() {
        let mut encoder = CategoricalEncoder::new(metadata())
            .unwrap()
            .with_pass_through_columns(vec!["LotArea".to_string(), "LotArea".to_string()]);
        let result = encoder.fit_transform(&full_df(), None).unwrap();

        assert_eq!(column_names(&result), vec!["CentralAir", "MSZoning", "LotArea"]);
        assert_eq!(encoder.n_features_out(), Some(3));
    }

    #[test]
    fn test_pass_through_of_encoded_column() {
        let mut encoder = CategoricalEncoder::new(metadata())
            .unwrap()
            .with_pass_through_columns(vec!["MSZoning".to_string()]);
        let err = encoder.fit(&full_df(), None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidParams { reason, .. } if reason.contains("MSZoning")
        ));
    }

    #[test]
    fn test_float_codes_match_integer_vocabulary() {
        let metadata = Arc::new(DatasetColumns::new().with_categorical("MSSubClass", ["20", "60"]));
        let df = df!("MSSubClass" => &[60.0f64, 20.0, 60.0]).unwrap();

        let mut encoder = CategoricalEncoder::new(metadata).unwrap();
        let result = encoder.fit_transform(&df, None).unwrap();
        assert_eq!(
            f64_values(&result, "MSSubClass").unwrap(),
            vec![Some(1.0), Some(0.0), Some(1.0)]
        );

        let fractional = df!("MSSubClass" => &[20.5f64]).unwrap();
        assert!(matches!(
            encoder.transform(&fractional),
            Err(PipelineError::UnknownColumnCategory { value, .. }) if value == "20.5"
        ));
    }

    #[test]
    fn test_width_checked() {
        let mut encoder = CategoricalEncoder::new(metadata()).unwrap();
        encoder.fit(&full_df(), None).unwrap();

        let narrower = full_df().drop("Street").unwrap();
        assert!(matches!(
            encoder.transform(&narrower),
            Err(PipelineError::FeatureMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_not_fitted() {
        let encoder = CategoricalEncoder::new(metadata()).unwrap();
        assert!(matches!(encoder.transform(&full_df()), Err(PipelineError::NotFitted(_))));
    }

    #[test]
    fn test_from_params() {
        let params: Params =
            serde_json::from_str(r#"{"one_hot": true, "force_dense_array": true}"#).unwrap();
        let encoder = CategoricalEncoder::from_params("categorical-encoder", &params, metadata()).unwrap();
        assert_eq!(encoder.encoding(), CategoryEncoding::OneHot { dense: true });
    }
}
