//! Average sale price per neighborhood
//!
//! One learned table backs two stages: a regressor that predicts the
//! neighborhood mean directly, and a transformer that appends it as a feature
//! so a downstream model can use it.

use crate::error::{PipelineError, Result};
use crate::estimator::{Regressor, Transformer};
use crate::frame::{check_target_len, float_column, string_values};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashMap;

/// Grouping column
pub const NEIGHBORHOOD: &str = "Neighborhood";

/// Column added by [`AveragePriceExtractor`]
pub const AVERAGE_PRICE_COLUMN: &str = "AveragePriceInNeighborhood";

/// Mean target per neighborhood plus the overall mean used as a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodPriceTable {
    means: HashMap<String, f64>,
    global_mean: f64,
}

impl NeighborhoodPriceTable {
    /// Learn the table from training rows.
    pub fn fit(x: &DataFrame, y: &Array1<f64>) -> Result<Self> {
        check_target_len(x, y)?;
        if y.is_empty() {
            return Err(PipelineError::InvalidInput(
                "cannot average prices over zero rows".to_string(),
            ));
        }

        let neighborhoods = string_values(x, NEIGHBORHOOD)?;

        let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
        for (neighborhood, &price) in neighborhoods.into_iter().zip(y.iter()) {
            if let Some(n) = neighborhood {
                let entry = sums.entry(n).or_insert((0.0, 0));
                entry.0 += price;
                entry.1 += 1;
            }
        }

        let means = sums
            .into_iter()
            .map(|(n, (sum, count))| (n, sum / count as f64))
            .collect();
        let global_mean = y.iter().sum::<f64>() / y.len() as f64;

        Ok(Self { means, global_mean })
    }

    /// Per-row average; unseen or null neighborhoods get the global mean.
    pub fn lookup(&self, x: &DataFrame) -> Result<Vec<f64>> {
        let neighborhoods = string_values(x, NEIGHBORHOOD)?;
        Ok(neighborhoods
            .iter()
            .map(|n| {
                n.as_ref()
                    .and_then(|n| self.means.get(n))
                    .copied()
                    .unwrap_or(self.global_mean)
            })
            .collect())
    }

    pub fn means(&self) -> &HashMap<String, f64> {
        &self.means
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }
}

/// Predicts the average training price of each row's neighborhood.
#[derive(Debug, Clone, Default)]
pub struct AveragePriceRegressor {
    table: Option<NeighborhoodPriceTable>,
}

impl AveragePriceRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned table, `None` before fit
    pub fn table(&self) -> Option<&NeighborhoodPriceTable> {
        self.table.as_ref()
    }
}

impl Regressor for AveragePriceRegressor {
    fn fit(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<()> {
        self.table = Some(NeighborhoodPriceTable::fit(x, y)?);
        Ok(())
    }

    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("AveragePriceRegressor".to_string()))?;
        Ok(Array1::from_vec(table.lookup(x)?))
    }
}

/// Appends `AveragePriceInNeighborhood` to a copy of the frame.
///
/// The target is needed at fit time only, so the stage can sit mid-pipeline.
#[derive(Debug, Clone, Default)]
pub struct AveragePriceExtractor {
    table: Option<NeighborhoodPriceTable>,
}

impl AveragePriceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&NeighborhoodPriceTable> {
        self.table.as_ref()
    }
}

impl Transformer for AveragePriceExtractor {
    fn fit(&mut self, x: &DataFrame, y: Option<&Array1<f64>>) -> Result<()> {
        let y = y.ok_or_else(|| PipelineError::MissingTarget("AveragePriceExtractor".to_string()))?;
        self.table = Some(NeighborhoodPriceTable::fit(x, y)?);
        Ok(())
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("AveragePriceExtractor".to_string()))?;

        let averages = table.lookup(x)?.into_iter().map(Some).collect();
        let mut result = x.clone();
        result.with_column(float_column(AVERAGE_PRICE_COLUMN, averages))?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::f64_values;
    use ndarray::array;

    fn train_df() -> DataFrame {
        df!("Neighborhood" => &["A", "A", "B"], "LotArea" => &[1.0, 2.0, 3.0]).unwrap()
    }

    fn query_df() -> DataFrame {
        df!("Neighborhood" => &["A", "B", "C"], "LotArea" => &[4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn test_table_means() {
        let table = NeighborhoodPriceTable::fit(&train_df(), &array![100.0, 200.0, 300.0]).unwrap();
        assert_eq!(table.means().len(), 2);
        assert_eq!(table.means()["A"], 150.0);
        assert_eq!(table.means()["B"], 300.0);
        assert_eq!(table.global_mean(), 200.0);
    }

    #[test]
    fn test_regressor_falls_back_to_global_mean() {
        let mut model = AveragePriceRegressor::new();
        model.fit(&train_df(), &array![100.0, 200.0, 300.0]).unwrap();

        let predictions = model.predict(&query_df()).unwrap();
        assert_eq!(predictions, array![150.0, 300.0, 200.0]);
    }

    #[test]
    fn test_extractor_matches_regressor() {
        let y = array![100.0, 200.0, 300.0];
        let mut regressor = AveragePriceRegressor::new();
        regressor.fit(&train_df(), &y).unwrap();
        let mut extractor = AveragePriceExtractor::new();
        extractor.fit(&train_df(), Some(&y)).unwrap();

        let query = query_df();
        let result = extractor.transform(&query).unwrap();
        let added: Vec<f64> = f64_values(&result, AVERAGE_PRICE_COLUMN)
            .unwrap()
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(added, regressor.predict(&query).unwrap().to_vec());
        assert_eq!(result.width(), query.width() + 1);
        assert!(query.column(AVERAGE_PRICE_COLUMN).is_err());
    }

    #[test]
    fn test_refit_overwrites() {
        let mut model = AveragePriceRegressor::new();
        model.fit(&train_df(), &array![100.0, 200.0, 300.0]).unwrap();
        model.fit(&train_df(), &array![10.0, 10.0, 40.0]).unwrap();

        let table = model.table().unwrap();
        assert_eq!(table.means()["A"], 10.0);
        assert_eq!(table.global_mean(), 20.0);
    }

    #[test]
    fn test_not_fitted() {
        assert!(matches!(
            AveragePriceRegressor::new().predict(&query_df()),
            Err(PipelineError::NotFitted(_))
        ));
        assert!(matches!(
            AveragePriceExtractor::new().transform(&query_df()),
            Err(PipelineError::NotFitted(_))
        ));
    }

    #[test]
    fn test_extractor_requires_target() {
        let err = AveragePriceExtractor::new().fit(&train_df(), None).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTarget(_)));
    }

    #[test]
    fn test_target_length_checked() {
        let err = NeighborhoodPriceTable::fit(&train_df(), &array![1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));
    }
}
