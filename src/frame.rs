//! Small helpers over polars frames shared by every stage.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Look up a column, mapping absence to [`PipelineError::MissingColumn`].
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))
}

/// Fail on the first column of `names` that `df` lacks.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, names: &[S]) -> Result<()> {
    for name in names {
        require_column(df, name.as_ref())?;
    }
    Ok(())
}

/// Column names in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Values of a column cast to Float64; nulls stay `None`.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?;
    if column.dtype() == &DataType::String {
        return Err(PipelineError::InvalidInput(format!(
            "column {} is not numeric",
            name
        )));
    }
    let casted = column
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = casted.f64()?.into_iter().collect();
    Ok(values)
}

/// Values of a column in their string form; nulls stay `None`.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?;
    let casted = column
        .as_materialized_series()
        .cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Build a Float64 column.
pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into()
}

/// Build a 0/1 indicator column: Float64 when `dense`, bit-packed Boolean otherwise.
pub fn indicator_column(name: &str, values: Vec<bool>, dense: bool) -> Column {
    if dense {
        let values: Vec<f64> = values
            .into_iter()
            .map(|v| if v { 1.0 } else { 0.0 })
            .collect();
        Series::new(name.into(), values).into()
    } else {
        Series::new(name.into(), values).into()
    }
}

/// Convert every column of a numeric frame into a row-major matrix.
///
/// Nulls are rejected rather than filled so that regressors never train on
/// silently invented values.
pub fn to_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let names = column_names(df);

    let col_data: Vec<Vec<f64>> = names
        .iter()
        .map(|name| {
            f64_values(df, name)?
                .into_iter()
                .map(|v| v.ok_or_else(|| PipelineError::MissingValues(name.clone())))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((df.height(), names.len()), |(r, c)| {
        col_data[c][r]
    }))
}

/// Check a target vector against the number of rows it should describe.
pub fn check_target_len(df: &DataFrame, y: &Array1<f64>) -> Result<()> {
    if df.height() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", df.height()),
            actual: format!("y length = {}", y.len()),
        });
    }
    Ok(())
}
