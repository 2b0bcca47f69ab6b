//! Training engine implementation

use super::metrics::{accuracy, confusion_matrix, macro_scores, observed_labels};
use super::split::{stratified_split, DEFAULT_SEED};
use super::{FittedPipeline, LabelEncoder, ModelSpec, TrainableClassifier};
use crate::error::{BuilderError, Result};
use crate::frame::FeatureTable;
use crate::preprocessing::FeaturePreprocessor;
use ndarray::Axis;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Evaluation of one training run on its held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResult {
    pub model_type: String,
    pub accuracy: f64,
    /// Macro averages, undefined ratios count as 0
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Rows are true labels, columns predicted labels, both in `labels` order
    pub confusion_matrix: Vec<Vec<u64>>,
    pub test_size: f64,
    pub labels: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
}

/// Splits, fits and evaluates one pipeline
#[derive(Debug, Clone)]
pub struct TrainingEngine {
    seed: u64,
}

impl Default for TrainingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingEngine {
    pub fn new() -> Self {
        Self { seed: DEFAULT_SEED }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit `preprocessor` (a fresh copy of it) and the estimator described by
    /// `spec` on a stratified train split of `features`/`target`, then score
    /// the held-out rows.
    pub fn train(
        &self,
        features: &DataFrame,
        target: &Series,
        preprocessor: &FeaturePreprocessor,
        spec: &ModelSpec,
        test_size: f64,
    ) -> Result<(FittedPipeline, TrainResult)> {
        let start = Instant::now();

        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(BuilderError::InvalidInput(format!(
                "test_size must be between 0 and 1 (exclusive), got {}",
                test_size
            )));
        }
        if features.height() != target.len() {
            return Err(BuilderError::ShapeError {
                expected: format!("{} target values", features.height()),
                actual: target.len().to_string(),
            });
        }

        let labels = LabelEncoder::fit(target)?;
        let n_classes = labels.n_classes();
        if n_classes < 2 {
            return Err(BuilderError::DataError(format!(
                "Target must contain at least two classes, found {}",
                n_classes
            )));
        }
        let y = labels.transform(target)?;

        let split = stratified_split(&y, n_classes, test_size, self.seed)?;

        let table = FeatureTable::from_frame(
            features,
            preprocessor.numeric_columns(),
            preprocessor.categorical_columns(),
        )?;
        let mut fitted_preprocessor = preprocessor.unfitted();
        let x_train = fitted_preprocessor.fit_transform(&table.take(&split.train))?;
        let x_test = fitted_preprocessor.transform(&table.take(&split.test))?;
        let y_train = y.select(Axis(0), &split.train);
        let y_test = y.select(Axis(0), &split.test);

        let mut estimator = spec.build();
        estimator.fit(&x_train, &y_train, n_classes)?;
        let y_pred = estimator.predict(&x_test)?;

        let observed = observed_labels(&y_test, &y_pred);
        let scores = macro_scores(&y_test, &y_pred, &observed);
        let result = TrainResult {
            model_type: spec.kind().as_str().to_string(),
            accuracy: accuracy(&y_test, &y_pred),
            precision: scores.precision,
            recall: scores.recall,
            f1: scores.f1,
            confusion_matrix: confusion_matrix(&y_test, &y_pred, &observed),
            test_size,
            labels: observed
                .iter()
                .filter_map(|&i| labels.decode(i).map(str::to_string))
                .collect(),
            n_train: split.train.len(),
            n_test: split.test.len(),
        };

        info!(
            model_type = %result.model_type,
            n_train = result.n_train,
            n_test = result.n_test,
            n_features = x_train.ncols(),
            accuracy = result.accuracy,
            f1 = result.f1,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );

        let pipeline = FittedPipeline {
            model_type: spec.kind(),
            preprocessor: fitted_preprocessor,
            estimator,
            labels,
        };
        Ok((pipeline, result))
    }
}
