//! Model training module
//!
//! Provides the regressors that can end a pipeline:
//! - Decision trees and Random Forests
//! - Linear models (OLS)

pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;

pub use decision_tree::{DecisionTree, TreeNode};
pub use linear_models::{LinearRegression, LinearRegressionParams};
pub use random_forest::{MaxFeatures, RandomForestParams, RandomForestRegressor};

use crate::error::{PipelineError, Result};
use ndarray::Array1;

/// Coefficient of determination R².
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    let y_mean = y_true
        .mean()
        .ok_or_else(|| PipelineError::InvalidInput("cannot score zero rows".to_string()))?;

    let ss_res = (y_pred - y_true).mapv(|v| v * v).sum();
    let ss_tot = y_true.mapv(|v| (v - y_mean) * (v - y_mean)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2_score() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![2.0, 2.0, 2.0]).unwrap(), 0.0);
        assert!(matches!(
            r2_score(&y, &array![1.0]),
            Err(PipelineError::ShapeError { .. })
        ));
    }
}
