//! Feature scaling

use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean
    scale: f64,  // population std, 1.0 for constant columns
}

/// Standard scaling (z-score normalization): (x - mean) / std
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit on already-imputed columns
    pub fn fit(&mut self, columns: &[&[f64]]) -> &mut Self {
        self.params = columns.iter().map(|c| Self::compute_params(c)).collect();
        self.is_fitted = true;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn transform_column(&self, idx: usize, values: &mut [f64]) -> Result<()> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        let params = self.params.get(idx).ok_or_else(|| BuilderError::ShapeError {
            expected: format!("column index < {}", self.params.len()),
            actual: idx.to_string(),
        })?;

        for v in values.iter_mut() {
            *v = (*v - params.center) / params.scale;
        }
        Ok(())
    }

    /// Learned (mean, scale) pairs in column order
    pub fn parameters(&self) -> Vec<(f64, f64)> {
        self.params.iter().map(|p| (p.center, p.scale)).collect()
    }

    fn compute_params(values: &[f64]) -> ScalerParams {
        if values.is_empty() {
            return ScalerParams { center: 0.0, scale: 1.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();

        ScalerParams {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        }
    }
}
