//! Builds the preprocessing pipeline for a dataset and prepares `X` / `y`

use super::{FeaturePreprocessor, PreprocessConfig, PreprocessMethod, SchemaAnalyzer};
use crate::error::{BuilderError, Result};
use crate::frame::{categorical_values, is_numeric_dtype, numeric_values};
use polars::prelude::*;
use tracing::{info, warn};

/// Output of a preprocessing call: everything the session stores
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Dataset with missing-target rows removed
    pub dataset: DataFrame,
    pub features: DataFrame,
    pub target: Series,
    /// Unfitted template; training fits a copy on its train split
    pub preprocessor: FeaturePreprocessor,
    pub config: PreprocessConfig,
    pub dropped_rows: usize,
}

pub struct PreprocessingPlanner;

impl PreprocessingPlanner {
    /// Choose a method for an analyzed config and build the unfitted pipeline
    pub fn build(
        config: &PreprocessConfig,
        method: &str,
    ) -> Result<(FeaturePreprocessor, PreprocessConfig)> {
        let method: PreprocessMethod = method.parse()?;
        if !config.has_features() {
            return Err(BuilderError::NoUsableFeatures);
        }

        let preprocessor = FeaturePreprocessor::new(
            method,
            config.numeric_columns.clone(),
            config.categorical_columns.clone(),
        );
        let config = PreprocessConfig {
            method: Some(method),
            ..config.clone()
        };
        Ok((preprocessor, config))
    }

    /// Analyze, build and split a dataset. Nothing is returned on failure, so
    /// a rejected call leaves the caller's state untouched.
    pub fn prepare(df: &DataFrame, target_column: &str, method: &str) -> Result<PreparedData> {
        let analyzed = SchemaAnalyzer::analyze(df, target_column)?;
        let (preprocessor, config) = Self::build(&analyzed, method)?;

        let (dataset, dropped_rows) = drop_missing_target(df, target_column)?;
        let features = dataset.select(config.feature_columns.iter().map(|c| c.as_str()))?;
        let target = dataset
            .column(target_column)?
            .as_materialized_series()
            .clone();

        info!(
            method = %method.trim().to_ascii_lowercase(),
            target = %target_column,
            numeric = config.numeric_columns.len(),
            categorical = config.categorical_columns.len(),
            rows = dataset.height(),
            "Preprocessing configured"
        );

        Ok(PreparedData {
            dataset,
            features,
            target,
            preprocessor,
            config,
            dropped_rows,
        })
    }
}

/// Remove rows whose target is null (or NaN for float targets). Returns the
/// cleaned frame and the number of rows removed.
pub fn drop_missing_target(df: &DataFrame, target_column: &str) -> Result<(DataFrame, usize)> {
    let series = df
        .column(target_column)
        .map_err(|_| BuilderError::InvalidTarget(target_column.to_string()))?
        .as_materialized_series();

    let keep: Vec<bool> = if is_numeric_dtype(series.dtype()) {
        numeric_values(series)?.iter().map(|v| v.is_some()).collect()
    } else {
        categorical_values(series)?.iter().map(|v| v.is_some()).collect()
    };

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped == 0 {
        return Ok((df.clone(), 0));
    }

    warn!(
        target = %target_column,
        dropped_rows = dropped,
        "Dropping rows with missing target"
    );
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok((df.filter(&mask)?, dropped))
}
