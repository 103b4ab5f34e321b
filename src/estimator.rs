//! Stage interfaces shared by every transformer and regressor

use crate::error::Result;
use ndarray::Array1;
use polars::prelude::DataFrame;
use std::fmt::{self, Debug};

/// A stage that learns from a frame and rewrites frames.
pub trait Transformer: Debug + Send + Sync {
    /// Learn state from `x` (and `y` where the stage is supervised).
    fn fit(&mut self, x: &DataFrame, y: Option<&Array1<f64>>) -> Result<()>;

    /// Produce a new frame; `x` is never modified.
    fn transform(&self, x: &DataFrame) -> Result<DataFrame>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &DataFrame, y: Option<&Array1<f64>>) -> Result<DataFrame> {
        self.fit(x, y)?;
        self.transform(x)
    }
}

/// A terminal stage that predicts the target.
pub trait Regressor: Debug + Send + Sync {
    fn fit(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>>;
}

/// What a stage can do once fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Transformer,
    Regressor,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Transformer => write!(f, "transformer"),
            StageKind::Regressor => write!(f, "regressor"),
        }
    }
}

/// One constructed pipeline stage.
#[derive(Debug)]
pub enum Stage {
    Transformer(Box<dyn Transformer>),
    Regressor(Box<dyn Regressor>),
}

impl Stage {
    pub fn transformer(t: impl Transformer + 'static) -> Self {
        Stage::Transformer(Box::new(t))
    }

    pub fn regressor(r: impl Regressor + 'static) -> Self {
        Stage::Regressor(Box::new(r))
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Transformer(_) => StageKind::Transformer,
            Stage::Regressor(_) => StageKind::Regressor,
        }
    }
}
