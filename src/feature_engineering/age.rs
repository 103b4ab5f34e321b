//! Age features derived from sale and construction years

use crate::error::Result;
use crate::estimator::Transformer;
use crate::frame::{f64_values, float_column, require_columns};
use ndarray::Array1;
use polars::prelude::*;

const YEAR_SOLD: &str = "YrSold";

/// (output column, year column subtracted from the sale year)
const DERIVED_AGES: [(&str, &str); 3] = [
    ("HouseAge", "YearBuilt"),
    ("RemodAddAge", "YearRemodAdd"),
    ("GarageAge", "GarageYrBlt"),
];

/// Adds `HouseAge`, `RemodAddAge` and `GarageAge` measured at sale time.
///
/// Stateless: `fit` only exists to satisfy the stage contract.
#[derive(Debug, Clone, Default)]
pub struct AgeExtractor;

impl AgeExtractor {
    pub fn new() -> Self {
        Self
    }

    fn required_columns() -> Vec<&'static str> {
        std::iter::once(YEAR_SOLD)
            .chain(DERIVED_AGES.iter().map(|(_, source)| *source))
            .collect()
    }
}

impl Transformer for AgeExtractor {
    fn fit(&mut self, _x: &DataFrame, _y: Option<&Array1<f64>>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        require_columns(x, &Self::required_columns())?;

        let sold = f64_values(x, YEAR_SOLD)?;
        let mut result = x.clone();

        for (output, source) in DERIVED_AGES {
            let built = f64_values(x, source)?;
            let ages: Vec<Option<f64>> = sold
                .iter()
                .zip(built)
                .map(|(s, b)| match (s, b) {
                    (Some(s), Some(b)) => Some(s - b),
                    _ => None,
                })
                .collect();
            result.with_column(float_column(output, ages))?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn years_df() -> DataFrame {
        df!(
            "YrSold" => &[2010i64, 2008],
            "YearBuilt" => &[2000i64, 1950],
            "YearRemodAdd" => &[2005i64, 1990],
            "GarageYrBlt" => &[Some(2008.0), None],
        )
        .unwrap()
    }

    #[test]
    fn test_ages() {
        let df = years_df();
        let result = AgeExtractor::new().fit_transform(&df, None).unwrap();

        let col = |name: &str| f64_values(&result, name).unwrap();
        assert_eq!(col("HouseAge"), vec![Some(10.0), Some(58.0)]);
        assert_eq!(col("RemodAddAge"), vec![Some(5.0), Some(18.0)]);
        assert_eq!(col("GarageAge"), vec![Some(2.0), None]);
        assert_eq!(result.width(), df.width() + 3);
    }

    #[test]
    fn test_input_not_mutated() {
        let df = years_df();
        let before = df.clone();
        let _ = AgeExtractor::new().transform(&df).unwrap();
        assert!(df.equals_missing(&before));
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_missing_column() {
        let df = df!("YrSold" => &[2010i64], "YearBuilt" => &[2000i64]).unwrap();
        let err = AgeExtractor::new().transform(&df).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(name) if name == "YearRemodAdd"));
    }
}
