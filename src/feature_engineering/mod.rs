//! Feature engineering stages
//!
//! - [`AgeExtractor`] - building ages at sale time
//! - [`AveragePriceExtractor`] / [`AveragePriceRegressor`] - neighborhood price means
//! - [`InteractionCrosser`] - interaction-only polynomial features

mod age;
mod crosser;
mod neighborhood;

pub use age::AgeExtractor;
pub use crosser::{ColumnRef, CrosserParams, InteractionCrosser};
pub use neighborhood::{
    AveragePriceExtractor, AveragePriceRegressor, NeighborhoodPriceTable, AVERAGE_PRICE_COLUMN,
    NEIGHBORHOOD,
};
