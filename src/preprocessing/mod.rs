//! Data preprocessing module
//!
//! Provides the preprocessing stages of the pipeline:
//! - Categorical encoding against fixed vocabularies (ordinal, one-hot)
//! - Feature scaling (StandardScaler)
//! - Binning and discretization (uniform, quantile, k-means)

mod discretizer;
mod encoder;
mod scaler;

pub use discretizer::{BinEncoding, BinningStrategy, ColumnBins, DiscretizerParams, KBinsDiscretizer};
pub use encoder::{CategoricalEncoder, CategoricalEncoderParams, CategoryEncoding};
pub use scaler::{ColumnScale, StandardScaler, StandardScalerParams};
