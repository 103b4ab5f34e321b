//! Binning of selected numeric columns

use crate::config::{parse_params, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::Transformer;
use crate::frame::{f64_values, float_column, indicator_column};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Edges closer than this are treated as duplicates
const EDGE_TOLERANCE: f64 = 1e-8;

const KMEANS_MAX_ITER: usize = 100;

/// Strategy for placing bin edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinningStrategy {
    /// Equal-width bins
    Uniform,
    /// Equal-frequency bins
    #[default]
    Quantile,
    /// Bins around one-dimensional k-means centroids
    KMeans,
}

/// How to encode binned values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BinEncoding {
    /// One Boolean indicator per bin
    #[default]
    #[serde(rename = "onehot")]
    OneHot,
    /// One Float64 indicator per bin
    #[serde(rename = "onehot-dense")]
    OneHotDense,
    /// Bin index as Float64
    #[serde(rename = "ordinal")]
    Ordinal,
}

/// Parameters of the `discretizer` stage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscretizerParams {
    /// Column name -> number of bins, in output order
    pub bins_per_column: Map<String, Value>,
    #[serde(default)]
    pub encode: BinEncoding,
    #[serde(default, alias = "stratey")]
    pub strategy: BinningStrategy,
}

/// Fitted edges of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBins {
    pub column: String,
    pub edges: Vec<f64>,
}

impl ColumnBins {
    pub fn n_bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Number of interior edges at or below `value`
    fn find_bin(&self, value: f64) -> usize {
        let interior = &self.edges[1..self.edges.len().saturating_sub(1).max(1)];
        interior
            .iter()
            .take_while(|&&edge| edge <= value)
            .count()
            .min(self.n_bins().saturating_sub(1))
    }
}

/// Discretizes the configured columns and drops every other column.
#[derive(Debug, Clone)]
pub struct KBinsDiscretizer {
    bins_per_column: Vec<(String, usize)>,
    encode: BinEncoding,
    strategy: BinningStrategy,
    fitted: Option<Vec<ColumnBins>>,
}

impl KBinsDiscretizer {
    /// Create a discretizer; every column needs at least two bins.
    pub fn new(bins_per_column: Vec<(String, usize)>) -> Result<Self> {
        if bins_per_column.is_empty() {
            return Err(PipelineError::invalid_params(
                "discretizer",
                "`bins_per_column` is empty",
            ));
        }
        if let Some((column, n)) = bins_per_column.iter().find(|(_, n)| *n < 2) {
            return Err(PipelineError::invalid_params(
                "discretizer",
                format!("column {} needs at least 2 bins, got {}", column, n),
            ));
        }

        Ok(Self {
            bins_per_column,
            encode: BinEncoding::default(),
            strategy: BinningStrategy::default(),
            fitted: None,
        })
    }

    pub fn with_encoding(mut self, encode: BinEncoding) -> Self {
        self.encode = encode;
        self
    }

    pub fn with_strategy(mut self, strategy: BinningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Construct from `discretizer` config params
    pub fn from_params(estimator: &str, params: &Params) -> Result<Self> {
        let p: DiscretizerParams = parse_params(estimator, params)?;

        let mut bins = Vec::with_capacity(p.bins_per_column.len());
        for (column, value) in p.bins_per_column {
            let n = value.as_u64().ok_or_else(|| {
                PipelineError::invalid_params(
                    estimator,
                    format!("bin count for {} is not a positive integer: {}", column, value),
                )
            })?;
            bins.push((column, n as usize));
        }

        Ok(Self::new(bins)
            .map_err(|e| match e {
                PipelineError::InvalidParams { reason, .. } => {
                    PipelineError::invalid_params(estimator, reason)
                }
                other => other,
            })?
            .with_encoding(p.encode)
            .with_strategy(p.strategy))
    }

    /// Fitted edges in output order
    pub fn bin_edges(&self) -> Option<&[ColumnBins]> {
        self.fitted.as_deref()
    }

    fn column_values(x: &DataFrame, column: &str) -> Result<Vec<f64>> {
        f64_values(x, column)?
            .into_iter()
            .map(|v| v.ok_or_else(|| PipelineError::MissingValues(column.to_string())))
            .collect()
    }

    /// Compute bin edges based on strategy
    fn compute_bin_edges(&self, column: &str, values: &mut [f64], n_bins: usize) -> Result<Vec<f64>> {
        if values.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "cannot bin empty column {}",
                column
            )));
        }

        values.sort_by(f64::total_cmp);
        let min_val = values[0];
        let max_val = values[values.len() - 1];

        if max_val - min_val <= EDGE_TOLERANCE {
            warn!(column, "Constant column collapsed into a single bin");
            return Ok(vec![min_val, max_val]);
        }

        let edges = match self.strategy {
            BinningStrategy::Uniform => linspace(min_val, max_val, n_bins),
            BinningStrategy::Quantile => (0..=n_bins)
                .map(|i| percentile(values, i as f64 / n_bins as f64))
                .collect(),
            BinningStrategy::KMeans => kmeans_bin_edges(values, n_bins),
        };

        let mut collapsed: Vec<f64> = Vec::with_capacity(edges.len());
        for edge in edges {
            match collapsed.last() {
                Some(&prev) if edge - prev <= EDGE_TOLERANCE => {}
                _ => collapsed.push(edge),
            }
        }
        if collapsed.len() < n_bins + 1 {
            warn!(
                column,
                requested = n_bins,
                kept = collapsed.len() - 1,
                "Bins whose width is too small are removed"
            );
        }

        Ok(collapsed)
    }

    fn encode_column(&self, bins: &ColumnBins, indices: &[usize], out: &mut Vec<Column>) {
        match self.encode {
            BinEncoding::Ordinal => {
                let values = indices.iter().map(|&b| Some(b as f64)).collect();
                out.push(float_column(&bins.column, values));
            }
            BinEncoding::OneHot | BinEncoding::OneHotDense => {
                let dense = self.encode == BinEncoding::OneHotDense;
                for bin in 0..bins.n_bins() {
                    let name = format!("{}_bin{}", bins.column, bin);
                    let indicators = indices.iter().map(|&b| b == bin).collect();
                    out.push(indicator_column(&name, indicators, dense));
                }
            }
        }
    }
}

/// `n_bins + 1` evenly spaced points from `min` to `max`
fn linspace(min: f64, max: f64, n_bins: usize) -> Vec<f64> {
    let step = (max - min) / n_bins as f64;
    let mut edges: Vec<f64> = (0..n_bins).map(|i| min + i as f64 * step).collect();
    edges.push(max);
    edges
}

/// Linear-interpolated quantile `q` of sorted values
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Edges at midpoints between sorted 1-D k-means centroids, seeded at the
/// centers of uniform bins.
fn kmeans_bin_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];
    let uniform = linspace(min_val, max_val, n_bins);

    let mut centroids: Vec<f64> = uniform.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();

    for _ in 0..KMEANS_MAX_ITER {
        let mut sums = vec![0.0; n_bins];
        let mut counts = vec![0usize; n_bins];

        for &v in sorted {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| (v - **a).abs().total_cmp(&(v - **b).abs()))
                .map(|(i, _)| i)
                .unwrap_or(0);
            sums[nearest] += v;
            counts[nearest] += 1;
        }

        let mut converged = true;
        for (i, centroid) in centroids.iter_mut().enumerate() {
            if counts[i] > 0 {
                let updated = sums[i] / counts[i] as f64;
                if (updated - *centroid).abs() > 1e-6 {
                    converged = false;
                }
                *centroid = updated;
            }
        }

        if converged {
            break;
        }
    }

    centroids.sort_by(f64::total_cmp);

    let mut edges = vec![min_val];
    edges.extend(centroids.windows(2).map(|w| (w[0] + w[1]) / 2.0));
    edges.push(max_val);
    edges
}

impl Transformer for KBinsDiscretizer {
    fn fit(&mut self, x: &DataFrame, _y: Option<&Array1<f64>>) -> Result<()> {
        let fitted = self
            .bins_per_column
            .iter()
            .map(|(column, n_bins)| {
                let mut values = Self::column_values(x, column)?;
                let edges = self.compute_bin_edges(column, &mut values, *n_bins)?;
                Ok(ColumnBins {
                    column: column.clone(),
                    edges,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.fitted = Some(fitted);
        Ok(())
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("KBinsDiscretizer".to_string()))?;

        let mut columns = Vec::new();
        for bins in fitted {
            let indices: Vec<usize> = Self::column_values(x, &bins.column)?
                .into_iter()
                .map(|v| bins.find_bin(v))
                .collect();
            self.encode_column(bins, &indices, &mut columns);
        }

        Ok(DataFrame::new(columns)?)
    }
}
