//! Preprocessing configuration

use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How numeric features are prepared; categorical features are one-hot
/// encoded either way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMethod {
    /// Median imputation then standard scaling
    Normalization,
    /// Median imputation only
    #[serde(rename = "onehot")]
    OneHot,
}

impl PreprocessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreprocessMethod::Normalization => "normalization",
            PreprocessMethod::OneHot => "onehot",
        }
    }

    pub fn scales_numeric(&self) -> bool {
        matches!(self, PreprocessMethod::Normalization)
    }
}

impl FromStr for PreprocessMethod {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalization" => Ok(PreprocessMethod::Normalization),
            "onehot" => Ok(PreprocessMethod::OneHot),
            _ => Err(BuilderError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for PreprocessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column roles for one session. Replaced wholesale on every preprocess call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Unset until the planner has chosen a method
    pub method: Option<PreprocessMethod>,
    pub target_column: String,
    /// Every non-target column, in dataset order
    pub feature_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl PreprocessConfig {
    pub fn has_features(&self) -> bool {
        !self.numeric_columns.is_empty() || !self.categorical_columns.is_empty()
    }
}
