//! Feature scaling

use crate::config::{parse_params, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::Transformer;
use crate::frame::{column_names, f64_values, float_column};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Parameters of the `standard-scaler` stage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandardScalerParams {
    #[serde(default = "default_true")]
    pub with_mean: bool,
    #[serde(default = "default_true")]
    pub with_std: bool,
}

impl Default for StandardScalerParams {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

/// Parameters for a fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub center: f64,
    pub scale: f64,
}

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Every column of the frame is scaled; the standard deviation is the
/// population one and a constant column gets scale 1. Nulls are ignored when
/// fitting and stay null.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    with_mean: bool,
    with_std: bool,
    params: Option<Vec<ColumnScale>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self {
            with_mean: true,
            with_std: true,
            params: None,
        }
    }

    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    pub fn with_std(mut self, with_std: bool) -> Self {
        self.with_std = with_std;
        self
    }

    /// Construct from `standard-scaler` config params
    pub fn from_params(estimator: &str, params: &Params) -> Result<Self> {
        let p: StandardScalerParams = parse_params(estimator, params)?;
        Ok(Self::new().with_mean(p.with_mean).with_std(p.with_std))
    }

    /// Fitted per-column parameters in frame order
    pub fn column_scales(&self) -> Option<&[ColumnScale]> {
        self.params.as_deref()
    }

    fn compute_params(&self, column: &str, values: &[Option<f64>]) -> ColumnScale {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let n = present.len() as f64;

        let mean = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / n
        };
        let std = if present.is_empty() {
            0.0
        } else {
            (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        };

        ColumnScale {
            column: column.to_string(),
            center: if self.with_mean { mean } else { 0.0 },
            scale: if !self.with_std || std == 0.0 { 1.0 } else { std },
        }
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &DataFrame, _y: Option<&Array1<f64>>) -> Result<()> {
        let params = column_names(x)
            .iter()
            .map(|name| Ok(self.compute_params(name, &f64_values(x, name)?)))
            .collect::<Result<Vec<_>>>()?;

        self.params = Some(params);
        Ok(())
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("StandardScaler".to_string()))?;
        if x.width() != params.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: params.len(),
                actual: x.width(),
            });
        }

        let columns = params
            .iter()
            .map(|p| {
                let scaled = f64_values(x, &p.column)?
                    .into_iter()
                    .map(|v| v.map(|v| (v - p.center) / p.scale))
                    .collect();
                Ok(float_column(&p.column, scaled))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_df() -> DataFrame {
        df!(
            "a" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "b" => &[10i64, 10, 10, 10, 10],
        )
        .unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let mut scaler = StandardScaler::new();
        let result = scaler.fit_transform(&create_test_df(), None).unwrap();

        let a: Vec<f64> = f64_values(&result, "a").unwrap().into_iter().flatten().collect();
        let mean: f64 = a.iter().sum::<f64>() / a.len() as f64;
        assert!(mean.abs() < 1e-10);
        let var: f64 = a.iter().map(|v| v * v).sum::<f64>() / a.len() as f64;
        assert!((var - 1.0).abs() < 1e-10);

        // constant column: centered, scale 1
        let b = f64_values(&result, "b").unwrap();
        assert!(b.iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn test_without_mean() {
        let mut scaler = StandardScaler::new().with_mean(false);
        scaler.fit(&create_test_df(), None).unwrap();

        let scales = scaler.column_scales().unwrap();
        assert_eq!(scales[0].center, 0.0);
        assert!((scales[0].scale - 2.0f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn test_without_std() {
        let mut scaler = StandardScaler::new().with_std(false);
        let result = scaler.fit_transform(&create_test_df(), None).unwrap();
        assert_eq!(
            f64_values(&result, "a").unwrap(),
            vec![Some(-2.0), Some(-1.0), Some(0.0), Some(1.0), Some(2.0)]
        );
    }

    #[test]
    fn test_nulls_ignored() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0)]).unwrap();
        let result = StandardScaler::new().fit_transform(&df, None).unwrap();
        assert_eq!(
            f64_values(&result, "a").unwrap(),
            vec![Some(-1.0), None, Some(1.0)]
        );
    }

    #[test]
    fn test_params() {
        let params: Params = serde_json::from_str(r#"{"with_std": false}"#).unwrap();
        let scaler = StandardScaler::from_params("standard-scaler", &params).unwrap();
        assert!(scaler.with_mean);
        assert!(!scaler.with_std);

        let params: Params = serde_json::from_str(r#"{"copy": false}"#).unwrap();
        assert!(matches!(
            StandardScaler::from_params("standard-scaler", &params),
            Err(PipelineError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_not_fitted() {
        assert!(matches!(
            StandardScaler::new().transform(&create_test_df()),
            Err(PipelineError::NotFitted(_))
        ));
    }
}
