//! Housing Pipeline - config-driven house price regression
//!
//! This crate assembles regression pipelines for residential sale prices
//! from a declarative list of named steps:
//! - Domain feature extraction (building ages, neighborhood price averages)
//! - Categorical encoding against fixed vocabularies, scaling, binning
//! - Terminal regressors (random forest, linear, neighborhood average)
//!
//! # Modules
//!
//! ## Pipeline
//! - [`config`] - Pipeline configs and per-estimator params
//! - [`registry`] - Estimator names to stage constructors
//! - [`pipeline`] - Pipeline building, fitting and prediction
//!
//! ## Stages
//! - [`feature_engineering`] - Housing-specific feature extractors
//! - [`preprocessing`] - Encoding, scaling, discretization
//! - [`training`] - Regressors
//!
//! ## Support
//! - [`metadata`] - Dataset column lists and vocabularies
//! - [`frame`] - Polars frame helpers
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```no_run
//! use housing_pipeline::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> housing_pipeline::error::Result<()> {
//! let metadata = DatasetColumns::from_path("columns.json")?;
//! let registry = EstimatorRegistry::with_defaults(Arc::new(metadata));
//! let config = PipelineConfig::from_path("pipeline.json")?;
//! let pipeline = build_pipeline(&config, &registry)?;
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Pipeline assembly
pub mod config;
pub mod estimator;
pub mod pipeline;
pub mod registry;

// Stages
pub mod feature_engineering;
pub mod preprocessing;
pub mod training;

// Data access
pub mod frame;
pub mod metadata;

pub use error::{PipelineError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{Params, PipelineConfig, StepConfig};
    pub use crate::error::{PipelineError, Result};
    pub use crate::estimator::{Regressor, Stage, StageKind, Transformer};
    pub use crate::feature_engineering::{
        AgeExtractor, AveragePriceExtractor, AveragePriceRegressor, InteractionCrosser,
    };
    pub use crate::metadata::{ColumnMetadata, DatasetColumns};
    pub use crate::pipeline::{build_pipeline, Pipeline};
    pub use crate::preprocessing::{CategoricalEncoder, KBinsDiscretizer, StandardScaler};
    pub use crate::registry::EstimatorRegistry;
    pub use crate::training::{LinearRegression, RandomForestRegressor};
}
