//! Ordinary least squares

use crate::config::{parse_params, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::Regressor;
use crate::frame::{check_target_len, to_matrix};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Relative ridge added to the Gram diagonal when it is not positive definite
const RIDGE_JITTER: f64 = 1e-8;

/// Eigenvalues below this fraction of the largest are treated as zero
const PINV_RCOND: f64 = 1e-12;

const JACOBI_MAX_SWEEPS: usize = 100;

/// Solve `a * x = b` for symmetric positive definite `a` by Cholesky
/// decomposition `a = L * L^T`. `None` if `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Eigendecomposition `a = V diag(values) V^T` of a symmetric matrix by
/// cyclic Jacobi rotations. Eigenvectors are the columns of `V`.
fn symmetric_eigen(a: &Array2<f64>) -> Option<(Array1<f64>, Array2<f64>)> {
    let n = a.nrows();
    if n != a.ncols() || a.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut m = a.to_owned();
    let mut v = Array2::<f64>::eye(n);
    let total: f64 = m.iter().map(|x| x * x).sum();

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| m[[p, q]] * m[[p, q]])
            .sum();
        if off <= f64::EPSILON * f64::EPSILON * total {
            return Some((m.diag().to_owned(), v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (mkp, mkq) = (m[[k, p]], m[[k, q]]);
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let (mpk, mqk) = (m[[p, k]], m[[q, k]]);
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    None
}

/// Minimum-norm solution of `a * x = b` for symmetric positive semi-definite
/// `a`, through the pseudo-inverse.
fn pseudo_inverse_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if a.nrows() != b.len() {
        return None;
    }
    let (values, vectors) = symmetric_eigen(a)?;
    let largest = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let cutoff = largest * PINV_RCOND;

    let mut x = Array1::<f64>::zeros(b.len());
    for (k, &value) in values.iter().enumerate() {
        if value.abs() <= cutoff {
            continue;
        }
        let direction = vectors.column(k);
        x.scaled_add(direction.dot(b) / value, &direction);
    }
    Some(x)
}

/// Solve the normal equations `(X^T X) w = X^T y`: Cholesky first, then once
/// more with a small ridge on the diagonal, then the minimum-norm
/// pseudo-inverse solution.
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }

    let n = xtx.nrows();
    let scale = xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let ridge = RIDGE_JITTER * scale.max(1.0);
    warn!(ridge, "Gram matrix is not positive definite, retrying with ridge jitter");

    let mut regularized = xtx.clone();
    for i in 0..n {
        regularized[[i, i]] += ridge;
    }
    if let Some(w) = cholesky_solve(&regularized, &xty) {
        return Ok(w);
    }

    warn!("Ridge retry failed, using the pseudo-inverse solution");
    pseudo_inverse_solve(&xtx, &xty).ok_or_else(|| {
        PipelineError::ComputationError("cannot solve least squares on non-finite data".to_string())
    })
}

fn default_true() -> bool {
    true
}

/// Parameters of the `linear-regressor` stage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearRegressionParams {
    #[serde(default = "default_true")]
    pub fit_intercept: bool,
}

/// Linear regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Construct from `linear-regressor` config params
    pub fn from_params(estimator: &str, params: &Params) -> Result<Self> {
        let p: LinearRegressionParams = parse_params(estimator, params)?;
        Ok(Self::new().with_fit_intercept(p.fit_intercept))
    }

    /// Fit the model on a feature matrix
    pub fn fit_array(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::InvalidInput(
                "cannot fit a linear model on zero rows".to_string(),
            ));
        }

        let (coefficients, intercept) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| PipelineError::InvalidInput("empty feature matrix".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);

            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            let w = solve_least_squares(&x_centered, &y_centered)?;
            let intercept = y_mean - w.dot(&x_mean);
            (w, intercept)
        } else {
            (solve_least_squares(x, y)?, 0.0)
        };

        debug!(n_samples, n_features = x.ncols(), intercept, "Fitted linear regression");

        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        Ok(())
    }

    /// Make predictions
    pub fn predict_array(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("LinearRegression".to_string()))?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: coefficients.len(),
                actual: x.ncols(),
            });
        }

        Ok(x.dot(coefficients) + self.intercept)
    }

    /// Fitted weights, `None` before fit
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<()> {
        check_target_len(x, y)?;
        self.fit_array(&to_matrix(x)?, y)
    }

    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        self.predict_array(&to_matrix(x)?)
    }
}
