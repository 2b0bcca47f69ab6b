//! Fitted {preprocessing -> estimator} pipeline

use super::{Estimator, LabelEncoder, ModelKind, TrainableClassifier};
use crate::error::Result;
use crate::frame::FeatureTable;
use crate::preprocessing::FeaturePreprocessor;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything needed to score new rows: the fitted preprocessor, the fitted
/// estimator and the class labels its indices refer to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub model_type: ModelKind,
    pub preprocessor: FeaturePreprocessor,
    pub estimator: Estimator,
    pub labels: LabelEncoder,
}

impl FittedPipeline {
    /// Columns a frame must carry to be scored
    pub fn feature_columns(&self) -> Vec<String> {
        self.preprocessor
            .numeric_columns()
            .iter()
            .chain(self.preprocessor.categorical_columns())
            .cloned()
            .collect()
    }

    pub fn predict_table(&self, table: &FeatureTable) -> Result<Array1<usize>> {
        let x = self.preprocessor.transform(table)?;
        self.estimator.predict(&x)
    }

    /// Class indices for every row of `df`
    pub fn predict_indices(&self, df: &DataFrame) -> Result<Array1<usize>> {
        let table = FeatureTable::from_frame(
            df,
            self.preprocessor.numeric_columns(),
            self.preprocessor.categorical_columns(),
        )?;
        self.predict_table(&table)
    }

    /// Decoded class labels for every row of `df`
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Vec<String>> {
        Ok(self
            .predict_indices(df)?
            .iter()
            .map(|&i| self.labels.decode(i).unwrap_or_default().to_string())
            .collect())
    }
}
