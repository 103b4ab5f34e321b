//! Pipeline assembly and execution
//!
//! A [`Pipeline`] is an ordered list of named stages built from a
//! [`PipelineConfig`]. Every stage but the last must be a transformer; the
//! last may be a regressor, in which case the pipeline predicts.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::estimator::{Stage, StageKind};
use crate::registry::EstimatorRegistry;
use crate::training::r2_score;
use ndarray::Array1;
use polars::prelude::DataFrame;
use std::borrow::Cow;
use tracing::{debug, info};

/// Build an unfitted pipeline from `config`, resolving every step in
/// `registry`.
pub fn build_pipeline(config: &PipelineConfig, registry: &EstimatorRegistry) -> Result<Pipeline> {
    if config.is_empty() {
        return Err(PipelineError::InvalidPipeline(
            "pipeline config has no steps".to_string(),
        ));
    }

    let last = config.len() - 1;
    let mut steps = Vec::with_capacity(config.len());
    for (position, step) in config.steps.iter().enumerate() {
        let stage = registry.construct(&step.name, &step.params)?;
        if stage.kind() == StageKind::Regressor && position != last {
            return Err(PipelineError::InvalidPipeline(format!(
                "regressor {} at step {} must be the last step",
                step.name, position
            )));
        }
        steps.push((step.name.clone(), stage));
    }

    let pipeline = Pipeline { steps };
    info!(steps = ?pipeline.step_names(), "Built pipeline");
    Ok(pipeline)
}

/// Ordered `(name, stage)` sequence
#[derive(Debug)]
pub struct Pipeline {
    steps: Vec<(String, Stage)>,
}

impl Pipeline {
    /// Stages in order with their config names
    pub fn steps(&self) -> &[(String, Stage)] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the last stage is a regressor
    pub fn is_regressor(&self) -> bool {
        matches!(self.steps.last(), Some((_, Stage::Regressor(_))))
    }

    /// Fit every stage in order, feeding each transformer's output to the
    /// next stage. `y` is required when the pipeline ends in a regressor or
    /// contains a supervised transformer.
    pub fn fit(&mut self, x: &DataFrame, y: Option<&Array1<f64>>) -> Result<()> {
        self.fit_stages(x, y)?;
        Ok(())
    }

    /// Fit, then return the frame the last transformer produced.
    pub fn fit_transform(&mut self, x: &DataFrame, y: Option<&Array1<f64>>) -> Result<DataFrame> {
        if self.is_regressor() {
            return Err(PipelineError::InvalidPipeline(
                "fit_transform needs a pipeline of transformers only".to_string(),
            ));
        }
        Ok(self.fit_stages(x, y)?.into_owned())
    }

    fn fit_stages<'a>(
        &mut self,
        x: &'a DataFrame,
        y: Option<&Array1<f64>>,
    ) -> Result<Cow<'a, DataFrame>> {
        let mut current = Cow::Borrowed(x);

        for (name, stage) in &mut self.steps {
            match stage {
                Stage::Transformer(t) => {
                    let next = t.fit_transform(&current, y)?;
                    debug!(stage = %name, rows = next.height(), columns = next.width(), "Fitted transformer");
                    current = Cow::Owned(next);
                }
                Stage::Regressor(r) => {
                    let y = y.ok_or_else(|| PipelineError::MissingTarget(name.clone()))?;
                    r.fit(&current, y)?;
                    debug!(stage = %name, rows = current.height(), columns = current.width(), "Fitted regressor");
                }
            }
        }

        info!(steps = self.steps.len(), rows = x.height(), "Fitted pipeline");
        Ok(current)
    }

    /// Replay every transformer on `x`, returning the frame the last one
    /// produced.
    fn transform_stages<'a>(&self, x: &'a DataFrame) -> Result<Cow<'a, DataFrame>> {
        let mut current = Cow::Borrowed(x);
        for (_, stage) in &self.steps {
            if let Stage::Transformer(t) = stage {
                current = Cow::Owned(t.transform(&current)?);
            }
        }
        Ok(current)
    }

    /// Apply every stage; all stages must be transformers.
    pub fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        if self.is_regressor() {
            return Err(PipelineError::InvalidPipeline(
                "transform needs a pipeline of transformers only".to_string(),
            ));
        }
        Ok(self.transform_stages(x)?.into_owned())
    }

    /// Transform with every transformer, then predict with the final
    /// regressor.
    pub fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let Some((_, Stage::Regressor(regressor))) = self.steps.last() else {
            return Err(PipelineError::InvalidPipeline(
                "predict needs a pipeline ending in a regressor".to_string(),
            ));
        };
        let features = self.transform_stages(x)?;
        regressor.predict(&features)
    }

    /// Coefficient of determination R² of the predictions on `x`
    pub fn score(&self, x: &DataFrame, y: &Array1<f64>) -> Result<f64> {
        let predictions = self.predict(x)?;
        r2_score(y, &predictions)
    }
}
