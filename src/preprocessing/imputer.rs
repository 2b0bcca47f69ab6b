//! Missing value imputation

use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Median of the observed values; 0.0 when nothing was observed
pub fn median(values: &[Option<f64>]) -> f64 {
    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return 0.0;
    }
    observed.sort_by(|a, b| a.total_cmp(b));

    let mid = observed.len() / 2;
    if observed.len() % 2 == 0 {
        (observed[mid - 1] + observed[mid]) / 2.0
    } else {
        observed[mid]
    }
}

/// Most frequent observed value, ties to the lexicographically smallest;
/// empty string when nothing was observed
pub fn most_frequent(values: &[Option<String>]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        match best {
            Some((_, c)) if count <= c => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(v, _)| v.to_string()).unwrap_or_default()
}

/// Median imputer over a block of numeric columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Vec<f64>,
    is_fitted: bool,
}

impl MedianImputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, columns: &[&[Option<f64>]]) -> &mut Self {
        self.medians = columns.iter().map(|c| median(c)).collect();
        self.is_fitted = true;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fill_values(&self) -> &[f64] {
        &self.medians
    }

    /// Replace missing entries of column `idx` with its learned median
    pub fn transform_column(&self, idx: usize, values: &[Option<f64>]) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        let fill = *self.medians.get(idx).ok_or_else(|| BuilderError::ShapeError {
            expected: format!("column index < {}", self.medians.len()),
            actual: idx.to_string(),
        })?;
        Ok(values.iter().map(|v| v.unwrap_or(fill)).collect())
    }
}

/// Most-frequent imputer over a block of categorical columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeImputer {
    modes: Vec<String>,
    is_fitted: bool,
}

impl ModeImputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, columns: &[&[Option<String>]]) -> &mut Self {
        self.modes = columns.iter().map(|c| most_frequent(c)).collect();
        self.is_fitted = true;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fill_values(&self) -> &[String] {
        &self.modes
    }

    pub fn transform_column(&self, idx: usize, values: &[Option<String>]) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        let fill = self.modes.get(idx).ok_or_else(|| BuilderError::ShapeError {
            expected: format!("column index < {}", self.modes.len()),
            actual: idx.to_string(),
        })?;
        Ok(values
            .iter()
            .map(|v| v.clone().unwrap_or_else(|| fill.clone()))
            .collect())
    }
}
