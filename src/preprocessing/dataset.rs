//! Tabular dataset with identifier and target columns

use crate::error::{Result, StackwiseError};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// A loaded table split into identifier, target and feature columns
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    id_column: String,
    target_column: String,
    feature_names: Vec<String>,
}

impl Dataset {
    /// Wrap a DataFrame. Fails with a schema error if the identifier or target column is absent.
    pub fn from_frame(
        frame: DataFrame,
        id_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Result<Self> {
        let id_column = id_column.into();
        let target_column = target_column.into();

        for required in [&id_column, &target_column] {
            if frame.column(required).is_err() {
                return Err(StackwiseError::SchemaError(format!(
                    "required column '{}' not found in dataset",
                    required
                )));
            }
        }

        let feature_names: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != id_column && name.as_str() != target_column)
            .map(|name| name.to_string())
            .collect();

        if feature_names.is_empty() {
            return Err(StackwiseError::SchemaError(
                "dataset has no feature columns".to_string(),
            ));
        }

        Ok(Self {
            frame,
            id_column,
            target_column,
            feature_names,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Feature column names in file order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    /// Feature matrix (rows × features)
    pub fn features(&self) -> Result<Array2<f64>> {
        columns_to_array2(&self.frame, &self.feature_names)
    }

    /// Binary target vector. Every value must be 0 or 1.
    pub fn target(&self) -> Result<Array1<f64>> {
        let values = numeric_column(&self.frame, &self.target_column)?;
        if let Some(bad) = values.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(StackwiseError::ValidationError(format!(
                "target column '{}' must be binary (0/1), found {}",
                self.target_column, bad
            )));
        }
        Ok(Array1::from_vec(values))
    }

    /// A single original row, all columns included
    pub fn row(&self, index: usize) -> Result<DataFrame> {
        if index >= self.frame.height() {
            return Err(StackwiseError::ValidationError(format!(
                "row {} out of range for {} rows",
                index,
                self.frame.height()
            )));
        }
        Ok(self.frame.slice(index as i64, 1))
    }
}

/// Extract one column as f64 values. Nulls and values that do not parse as numbers are errors.
pub(crate) fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| StackwiseError::SchemaError(format!("column '{}' not found", name)))?;

    if column.null_count() > 0 {
        return Err(StackwiseError::DataError(format!(
            "column '{}' contains {} missing values",
            name,
            column.null_count()
        )));
    }

    let casted = column
        .cast(&DataType::Float64)
        .map_err(|e| StackwiseError::DataError(format!("column '{}': {}", name, e)))?;

    if casted.null_count() > 0 {
        return Err(StackwiseError::DataError(format!(
            "column '{}' is not numeric ({})",
            name,
            column.dtype()
        )));
    }

    let values: Vec<f64> = casted
        .as_materialized_series()
        .f64()
        .map_err(|e| StackwiseError::DataError(e.to_string()))?
        .into_no_null_iter()
        .collect();

    Ok(values)
}

/// Extract named columns from a DataFrame into a row-major `Array2<f64>`.
pub(crate) fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| numeric_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}
