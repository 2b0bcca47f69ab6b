//! Column role detection

use super::PreprocessConfig;
use crate::error::{BuilderError, Result};
use crate::frame::is_numeric_dtype;
use polars::prelude::*;
use tracing::debug;

/// Splits the non-target columns of a dataset into numeric and categorical
pub struct SchemaAnalyzer;

impl SchemaAnalyzer {
    /// Classify every feature column. Integer and float storage is numeric;
    /// strings, booleans, temporals and anything else are categorical.
    pub fn analyze(df: &DataFrame, target_column: &str) -> Result<PreprocessConfig> {
        if df.column(target_column).is_err() {
            return Err(BuilderError::InvalidTarget(target_column.to_string()));
        }

        let mut feature_columns = Vec::new();
        let mut numeric_columns = Vec::new();
        let mut categorical_columns = Vec::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == target_column {
                continue;
            }
            if is_numeric_dtype(col.dtype()) {
                numeric_columns.push(name.clone());
            } else {
                categorical_columns.push(name.clone());
            }
            feature_columns.push(name);
        }

        debug!(
            target = %target_column,
            numeric = numeric_columns.len(),
            categorical = categorical_columns.len(),
            "Analyzed dataset schema"
        );

        Ok(PreprocessConfig {
            method: None,
            target_column: target_column.to_string(),
            feature_columns,
            numeric_columns,
            categorical_columns,
        })
    }
}
