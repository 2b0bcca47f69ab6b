//! Perceptron classifier
//!
//! Mistake-driven linear separator trained with per-sample updates over
//! shuffled epochs. More than two classes are handled one-vs-rest.

use super::classifier::{check_fit_input, check_predict_input, TrainableClassifier};
use crate::error::{BuilderError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perceptron {
    /// Step size for weight updates
    pub eta: f64,
    pub max_iter: usize,
    /// Minimum epoch-loss improvement per sample
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub random_state: u64,
    /// One row per binary problem (a single row for two classes)
    weights: Array2<f64>,
    intercepts: Array1<f64>,
    n_features: usize,
    n_classes: usize,
    is_fitted: bool,
}

impl Default for Perceptron {
    fn default() -> Self {
        Self::new()
    }
}

impl Perceptron {
    pub fn new() -> Self {
        Self {
            eta: 1.0,
            max_iter: 1000,
            tol: 1e-3,
            n_iter_no_change: 5,
            random_state: super::DEFAULT_SEED,
            weights: Array2::zeros((0, 0)),
            intercepts: Array1::zeros(0),
            n_features: 0,
            n_classes: 0,
            is_fitted: false,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Train one binary separator; `signs[i]` is +1 or -1
    fn fit_binary(&self, x: &Array2<f64>, signs: &[f64], rng: &mut Xoshiro256PlusPlus) -> (Array1<f64>, f64, usize) {
        let n = x.nrows();
        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;
        let mut order: Vec<usize> = (0..n).collect();

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut epochs = 0usize;

        for _ in 0..self.max_iter {
            epochs += 1;
            order.shuffle(rng);
            let mut epoch_loss = 0.0;

            for &i in &order {
                let row = x.row(i);
                let margin = signs[i] * (row.dot(&w) + b);
                if margin <= 0.0 {
                    epoch_loss -= margin;
                    w.scaled_add(self.eta * signs[i], &row);
                    b += self.eta * signs[i];
                }
            }

            if epoch_loss > best_loss - self.tol * n as f64 {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if no_improvement >= self.n_iter_no_change {
                break;
            }
        }

        (w, b, epochs)
    }

    fn decision(&self, row: ArrayView1<f64>) -> Vec<f64> {
        self.weights
            .rows()
            .into_iter()
            .zip(self.intercepts.iter())
            .map(|(w, b)| row.dot(&w) + b)
            .collect()
    }
}

impl TrainableClassifier for Perceptron {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        check_fit_input(x, y, n_classes)?;
        if n_classes < 2 {
            return Err(BuilderError::DataError("Perceptron needs at least two classes".to_string()));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        // Binary problems learn a single separator for the higher class
        let targets: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };

        let mut weights = Array2::<f64>::zeros((targets.len(), x.ncols()));
        let mut intercepts = Array1::<f64>::zeros(targets.len());
        for (k, &class) in targets.iter().enumerate() {
            let signs: Vec<f64> = y.iter().map(|&c| if c == class { 1.0 } else { -1.0 }).collect();
            let (w, b, epochs) = self.fit_binary(x, &signs, &mut rng);
            debug!(class = class, epochs = epochs, "Perceptron separator trained");
            weights.row_mut(k).assign(&w);
            intercepts[k] = b;
        }

        self.weights = weights;
        self.intercepts = intercepts;
        self.n_features = x.ncols();
        self.n_classes = n_classes;
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let scores = self.decision(row);
                if self.n_classes == 2 {
                    usize::from(scores[0] > 0.0)
                } else {
                    // first maximum wins
                    let mut best = 0;
                    for (k, &s) in scores.iter().enumerate() {
                        if s > scores[best] {
                            best = k;
                        }
                    }
                    best
                }
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
