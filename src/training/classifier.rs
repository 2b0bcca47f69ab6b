//! Estimator capability and the serializable estimator enum

use super::{DecisionTreeClassifier, MLPClassifier, Perceptron};
use crate::error::{BuilderError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fit/predict contract every estimator implements. Labels are dense class
/// indices in `0..n_classes`.
pub trait TrainableClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    fn is_fitted(&self) -> bool;
}

/// A built estimator of one of the supported kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    Perceptron(Perceptron),
    DecisionTree(DecisionTreeClassifier),
    Mlp(MLPClassifier),
}

impl Estimator {
    fn inner(&self) -> &dyn TrainableClassifier {
        match self {
            Estimator::Perceptron(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::Mlp(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TrainableClassifier {
        match self {
            Estimator::Perceptron(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::Mlp(m) => m,
        }
    }
}

impl TrainableClassifier for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Shared input validation for `fit`
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(BuilderError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(BuilderError::DataError("Cannot fit on an empty training set".to_string()));
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(BuilderError::DataError(format!(
            "Class index {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// Shared input validation for `predict`
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(BuilderError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
