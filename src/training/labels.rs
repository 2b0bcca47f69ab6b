//! Target label encoding

use crate::error::{BuilderError, Result};
use crate::frame::{categorical_values, is_numeric_dtype, numeric_values};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps target values to dense class indices. Numeric targets order their
/// classes numerically, everything else lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
    numeric: bool,
}

impl LabelEncoder {
    pub fn fit(series: &Series) -> Result<Self> {
        let numeric = is_numeric_dtype(series.dtype());
        let classes = if numeric {
            let mut values: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();
            values.into_iter().map(format_numeric).collect()
        } else {
            let mut values: Vec<String> = categorical_values(series)?.into_iter().flatten().collect();
            values.sort();
            values.dedup();
            values
        };

        Ok(Self { classes, numeric })
    }

    /// Encode every value; missing targets are rejected
    pub fn transform(&self, series: &Series) -> Result<Array1<usize>> {
        let index: HashMap<&str, usize> = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        self.raw_labels(series)?
            .into_iter()
            .map(|label| {
                let label = label
                    .ok_or_else(|| BuilderError::DataError("Target contains missing values".to_string()))?;
                index.get(label.as_str()).copied().ok_or_else(|| {
                    BuilderError::DataError(format!("Unknown target label '{}'", label))
                })
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn decode(&self, idx: usize) -> Option<&str> {
        self.classes.get(idx).map(|c| c.as_str())
    }

    fn raw_labels(&self, series: &Series) -> Result<Vec<Option<String>>> {
        if self.numeric {
            Ok(numeric_values(series)?
                .into_iter()
                .map(|v| v.map(format_numeric))
                .collect())
        } else {
            categorical_values(series)
        }
    }
}

fn format_numeric(v: f64) -> String {
    format!("{}", v)
}
