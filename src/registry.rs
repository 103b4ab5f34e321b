//! Estimator registry
//!
//! Maps the names used in pipeline configs to stage constructors. Every
//! entry declares whether it builds a transformer or a regressor, and the
//! declaration is checked each time a stage is constructed.

use crate::config::{parse_params, NoParams, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::{Stage, StageKind};
use crate::feature_engineering::{
    AgeExtractor, AveragePriceExtractor, AveragePriceRegressor, InteractionCrosser,
};
use crate::metadata::ColumnMetadata;
use crate::preprocessing::{CategoricalEncoder, KBinsDiscretizer, StandardScaler};
use crate::training::{LinearRegression, RandomForestRegressor};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const RANDOM_FOREST_REGRESSOR: &str = "random-forest-regressor";
pub const LINEAR_REGRESSOR: &str = "linear-regressor";
pub const AVERAGE_PRICE_REGRESSOR: &str = "average-price-per-neighborhood-regressor";
pub const AGE_EXTRACTOR: &str = "age-extractor";
pub const CATEGORICAL_ENCODER: &str = "categorical-encoder";
pub const STANDARD_SCALER: &str = "standard-scaler";
pub const DISCRETIZER: &str = "discretizer";
pub const CROSSER: &str = "crosser";
pub const AVERAGER: &str = "averager";

/// Builds a stage from its config params
pub type StageConstructor = Box<dyn Fn(&Params) -> Result<Stage> + Send + Sync>;

/// A registered estimator
pub struct RegistryEntry {
    name: String,
    kind: StageKind,
    constructor: StageConstructor,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Run the constructor and check the stage against the declared kind.
    pub fn construct(&self, params: &Params) -> Result<Stage> {
        let stage = (self.constructor)(params)?;
        if stage.kind() != self.kind {
            return Err(PipelineError::InvalidPipeline(format!(
                "estimator {} is registered as a {} but built a {}",
                self.name,
                self.kind,
                stage.kind()
            )));
        }
        Ok(stage)
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Name -> estimator constructor table
#[derive(Debug, Default)]
pub struct EstimatorRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl EstimatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in estimator. The categorical encoder
    /// reads its columns and vocabularies from `metadata`.
    pub fn with_defaults(metadata: Arc<dyn ColumnMetadata>) -> Self {
        let mut registry = Self::new();
        for (name, kind, constructor) in default_entries(metadata) {
            registry.insert(name, kind, constructor);
        }
        registry
    }

    /// Add an estimator; a name can be registered once.
    pub fn register<F>(&mut self, name: &str, kind: StageKind, constructor: F) -> Result<()>
    where
        F: Fn(&Params) -> Result<Stage> + Send + Sync + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(PipelineError::invalid_params(name, "estimator is already registered"));
        }
        self.insert(name, kind, Box::new(constructor));
        Ok(())
    }

    fn insert(&mut self, name: &str, kind: StageKind, constructor: StageConstructor) {
        self.entries.insert(
            name.to_string(),
            RegistryEntry {
                name: name.to_string(),
                kind,
                constructor,
            },
        );
    }

    /// Look up an estimator by name
    pub fn resolve(&self, name: &str) -> Result<&RegistryEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| PipelineError::UnknownEstimator(name.to_string()))
    }

    /// Build a fresh, unfitted stage
    pub fn construct(&self, name: &str, params: &Params) -> Result<Stage> {
        let entry = self.resolve(name)?;
        let stage = entry.construct(params)?;
        debug!(estimator = name, kind = %entry.kind, params = params.len(), "Constructed stage");
        Ok(stage)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry<F>(name: &'static str, kind: StageKind, constructor: F) -> (&'static str, StageKind, StageConstructor)
where
    F: Fn(&Params) -> Result<Stage> + Send + Sync + 'static,
{
    (name, kind, Box::new(constructor))
}

/// Constructor for stages that take no params
fn no_params(
    name: &'static str,
    build: fn() -> Stage,
) -> impl Fn(&Params) -> Result<Stage> + Send + Sync + 'static {
    move |params: &Params| {
        parse_params::<NoParams>(name, params)?;
        Ok(build())
    }
}

fn default_entries(
    metadata: Arc<dyn ColumnMetadata>,
) -> Vec<(&'static str, StageKind, StageConstructor)> {
    use StageKind::{Regressor, Transformer};

    vec![
        entry(RANDOM_FOREST_REGRESSOR, Regressor, |params| {
            RandomForestRegressor::from_params(RANDOM_FOREST_REGRESSOR, params).map(Stage::regressor)
        }),
        entry(LINEAR_REGRESSOR, Regressor, |params| {
            LinearRegression::from_params(LINEAR_REGRESSOR, params).map(Stage::regressor)
        }),
        entry(
            AVERAGE_PRICE_REGRESSOR,
            Regressor,
            no_params(AVERAGE_PRICE_REGRESSOR, || Stage::regressor(AveragePriceRegressor::new())),
        ),
        entry(
            AGE_EXTRACTOR,
            Transformer,
            no_params(AGE_EXTRACTOR, || Stage::transformer(AgeExtractor::new())),
        ),
        entry(CATEGORICAL_ENCODER, Transformer, move |params| {
            CategoricalEncoder::from_params(CATEGORICAL_ENCODER, params, Arc::clone(&metadata))
                .map(Stage::transformer)
        }),
        entry(STANDARD_SCALER, Transformer, |params| {
            StandardScaler::from_params(STANDARD_SCALER, params).map(Stage::transformer)
        }),
        entry(DISCRETIZER, Transformer, |params| {
            KBinsDiscretizer::from_params(DISCRETIZER, params).map(Stage::transformer)
        }),
        entry(CROSSER, Transformer, |params| {
            InteractionCrosser::from_params(CROSSER, params).map(Stage::transformer)
        }),
        entry(
            AVERAGER,
            Transformer,
            no_params(AVERAGER, || Stage::transformer(AveragePriceExtractor::new())),
        ),
    ]
}
