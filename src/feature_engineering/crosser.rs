//! Interaction features over a subset of columns

use crate::config::{parse_params, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::Transformer;
use crate::frame::{column_names, f64_values, float_column, require_column};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A column addressed by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    fn resolve(&self, names: &[String]) -> Result<String> {
        match self {
            ColumnRef::Index(i) => names
                .get(*i)
                .cloned()
                .ok_or_else(|| PipelineError::MissingColumn(format!("#{}", i))),
            ColumnRef::Name(name) if names.contains(name) => Ok(name.clone()),
            ColumnRef::Name(name) => Err(PipelineError::MissingColumn(name.clone())),
        }
    }
}

fn default_degree() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Parameters of the `crosser` stage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrosserParams {
    pub columns: Vec<ColumnRef>,
    #[serde(default = "default_degree")]
    pub degree: usize,
    #[serde(default = "default_true")]
    pub include_bias: bool,
}

/// Interaction-only polynomial features for the selected columns; every
/// other column is passed through after the crossed block.
///
/// Output order: bias `1` (optional), the selected columns, then products of
/// each combination of 2..=degree distinct selected columns named by joining
/// the source names with a space.
#[derive(Debug, Clone)]
pub struct InteractionCrosser {
    columns: Vec<ColumnRef>,
    degree: usize,
    include_bias: bool,
    /// Resolved names of the selected columns
    selected: Option<Vec<String>>,
    n_features_in: usize,
}

impl InteractionCrosser {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self {
            columns,
            degree: 2,
            include_bias: true,
            selected: None,
            n_features_in: 0,
        }
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_include_bias(mut self, include_bias: bool) -> Self {
        self.include_bias = include_bias;
        self
    }

    /// Construct from `crosser` config params
    pub fn from_params(estimator: &str, params: &Params) -> Result<Self> {
        let p: CrosserParams = parse_params(estimator, params)?;
        if p.columns.is_empty() {
            return Err(PipelineError::invalid_params(estimator, "`columns` is empty"));
        }
        if p.degree == 0 {
            return Err(PipelineError::invalid_params(estimator, "`degree` must be at least 1"));
        }
        Ok(Self::new(p.columns)
            .with_degree(p.degree)
            .with_include_bias(p.include_bias))
    }

    /// Names of the selected columns, `None` before fit
    pub fn selected_columns(&self) -> Option<&[String]> {
        self.selected.as_deref()
    }
}

/// Every k-subset of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn extend(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            extend(i + 1, n, k, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    extend(0, n, k, &mut Vec::with_capacity(k), &mut out);
    out
}

impl Transformer for InteractionCrosser {
    fn fit(&mut self, x: &DataFrame, _y: Option<&Array1<f64>>) -> Result<()> {
        let names = column_names(x);
        let mut selected = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let name = column.resolve(&names)?;
            if selected.contains(&name) {
                return Err(PipelineError::invalid_params(
                    "crosser",
                    format!("column {} selected twice", name),
                ));
            }
            selected.push(name);
        }

        self.n_features_in = x.width();
        self.selected = Some(selected);
        Ok(())
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let selected = self
            .selected
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("InteractionCrosser".to_string()))?;
        if x.width() != self.n_features_in {
            return Err(PipelineError::FeatureMismatch {
                expected: self.n_features_in,
                actual: x.width(),
            });
        }

        let values: Vec<Vec<Option<f64>>> = selected
            .iter()
            .map(|name| f64_values(x, name))
            .collect::<Result<_>>()?;

        let mut columns: Vec<Column> = Vec::new();
        if self.include_bias {
            columns.push(float_column("1", vec![Some(1.0); x.height()]));
        }
        for (name, column_values) in selected.iter().zip(&values) {
            columns.push(float_column(name, column_values.clone()));
        }

        for k in 2..=self.degree.min(selected.len()) {
            for combo in combinations(selected.len(), k) {
                let name = combo
                    .iter()
                    .map(|&i| selected[i].as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let products: Vec<Option<f64>> = (0..x.height())
                    .map(|row| {
                        combo
                            .iter()
                            .map(|&i| values[i][row])
                            .try_fold(1.0, |acc, v| v.map(|v| acc * v))
                    })
                    .collect();
                columns.push(float_column(&name, products));
            }
        }

        for name in column_names(x) {
            if !selected.contains(&name) {
                columns.push(require_column(x, &name)?.clone());
            }
        }

        Ok(DataFrame::new(columns)?)
    }
}
