//! Declarative pipeline configuration

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Keyword parameters of a single step.
pub type Params = Map<String, Value>;

/// One `{name, params}` entry of a pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Registry key of the estimator
    pub name: String,
    /// Constructor parameters
    #[serde(default)]
    pub params: Params,
}

impl StepConfig {
    /// Create a step without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
        }
    }

    /// Builder method to set one parameter
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Ordered list of steps; stage `i` feeds stage `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineConfig {
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    /// Create a configuration from steps
    pub fn new(steps: Vec<StepConfig>) -> Self {
        Self { steps }
    }

    /// Parse a JSON array of steps
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load a JSON array of steps from a file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Deserialize `params` into an estimator's typed parameter struct.
pub fn parse_params<T: DeserializeOwned>(estimator: &str, params: &Params) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| PipelineError::invalid_params(estimator, e))
}

/// Parameters of estimators that take none.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ScalerParams {
        #[serde(default)]
        with_mean: bool,
    }

    #[test]
    fn test_parse_config() {
        let json = r#"[
            {"name": "age-extractor"},
            {"name": "categorical-encoder", "params": {"one_hot": true}},
            {"name": "linear-regressor", "params": {}}
        ]"#;
        let config = PipelineConfig::from_json_str(json).unwrap();

        assert_eq!(config.len(), 3);
        assert_eq!(config.steps[0].name, "age-extractor");
        assert!(config.steps[0].params.is_empty());
        assert_eq!(config.steps[1].params["one_hot"], Value::Bool(true));
    }

    #[test]
    fn test_parse_params() {
        let step = StepConfig::new("standard-scaler").with_param("with_mean", true);
        let params: ScalerParams = parse_params(&step.name, &step.params).unwrap();
        assert!(params.with_mean);
    }

    #[test]
    fn test_parse_params_rejects_unknown() {
        let step = StepConfig::new("standard-scaler").with_param("with_median", true);
        let err = parse_params::<ScalerParams>(&step.name, &step.params).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidParams { estimator, .. } if estimator == "standard-scaler"
        ));
    }

    #[test]
    fn test_no_params() {
        assert!(parse_params::<NoParams>("age-extractor", &Params::new()).is_ok());

        let step = StepConfig::new("age-extractor").with_param("column", "YrSold");
        assert!(parse_params::<NoParams>(&step.name, &step.params).is_err());
    }
}
