//! One-hot encoding

use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder over sorted per-column vocabularies. Categories not seen
/// at fit time encode as an all-zero block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    vocabularies: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, columns: &[&[String]]) -> &mut Self {
        self.vocabularies = columns
            .iter()
            .map(|c| {
                c.iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .collect();
        self.is_fitted = true;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn vocabulary(&self, idx: usize) -> Option<&[String]> {
        self.vocabularies.get(idx).map(|v| v.as_slice())
    }

    /// Total indicator columns across all encoded columns
    pub fn output_width(&self) -> usize {
        self.vocabularies.iter().map(|v| v.len()).sum()
    }

    /// Indicator position of `value` within column `idx`, if known
    pub fn category_index(&self, idx: usize, value: &str) -> Result<Option<usize>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        let vocab = self.vocabularies.get(idx).ok_or_else(|| BuilderError::ShapeError {
            expected: format!("column index < {}", self.vocabularies.len()),
            actual: idx.to_string(),
        })?;
        Ok(vocab.binary_search_by(|c| c.as_str().cmp(value)).ok())
    }
}
