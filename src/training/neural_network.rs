//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! Feed-forward network with ReLU hidden layers and a softmax output, trained
//! by minibatch backpropagation with the Adam optimizer.

use super::classifier::{check_fit_input, check_predict_input, TrainableClassifier};
use crate::error::{BuilderError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const EPSILON: f64 = 1e-8;
const MAX_BATCH_SIZE: usize = 200;
const VALIDATION_FRACTION: f64 = 0.1;

/// Upper bound on weights plus biases of one network
pub const MAX_PARAMETERS: usize = 1 << 22;

/// Weights plus biases of a network with the given layer sizes; saturates
/// instead of overflowing
pub fn parameter_count(n_features: usize, hidden_layers: &[usize], n_classes: usize) -> usize {
    let mut sizes = Vec::with_capacity(hidden_layers.len() + 2);
    sizes.push(n_features);
    sizes.extend_from_slice(hidden_layers);
    sizes.push(n_classes);
    sizes.windows(2).fold(0usize, |total, pair| {
        total.saturating_add(pair[0].saturating_add(1).saturating_mul(pair[1]))
    })
}

/// Neural Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Initial Adam step size
    pub learning_rate: f64,
    /// Maximum number of epochs
    pub max_iter: usize,
    /// Minimum improvement of the monitored quantity
    pub tol: f64,
    /// Epochs without improvement before stopping
    pub n_iter_no_change: usize,
    /// Hold out 10% of the training rows and monitor their accuracy
    pub early_stopping: bool,
    /// L2 regularization
    pub alpha: f64,
    pub random_state: u64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            learning_rate: 0.001,
            max_iter: 300,
            tol: 1e-4,
            n_iter_no_change: 10,
            early_stopping: false,
            alpha: 0.0001,
            random_state: super::DEFAULT_SEED,
        }
    }
}

/// Per-parameter Adam moment estimates
#[derive(Debug, Clone)]
struct AdamState {
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
    t: i32,
}

impl AdamState {
    fn new(weights: &[Array2<f64>], biases: &[Array1<f64>]) -> Self {
        Self {
            m_w: weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            v_w: weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            m_b: biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            v_b: biases.iter().map(|b| Array1::zeros(b.len())).collect(),
            t: 0,
        }
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    n_classes: usize,
    /// Epochs actually run by the last fit
    n_iter: usize,
    loss: f64,
    is_fitted: bool,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            n_classes: 0,
            n_iter: 0,
            loss: 0.0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Final training loss
    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// Predict class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        let mut activations = self.forward(x);
        activations
            .pop()
            .ok_or_else(|| BuilderError::Internal("network has no layers".to_string()))
    }

    /// Glorot-uniform initialization
    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(self.n_classes);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let bound = (6.0 / (n_in + n_out) as f64).sqrt();

            let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound));
            let biases = Array1::from_shape_fn(n_out, |_| rng.gen_range(-bound..bound));
            self.weights.push(weights);
            self.biases.push(biases);
        }
    }

    /// Activations of every layer, input first, softmax output last
    fn forward(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        activations.push(x.clone());

        let last = self.weights.len().saturating_sub(1);
        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last { z.mapv(|v| v.max(0.0)) } else { softmax(z) };
            activations.push(a);
        }
        activations
    }

    /// Gradients for one minibatch plus its regularized cross-entropy loss
    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        activations: &[Array2<f64>],
    ) -> (Vec<(Array2<f64>, Array1<f64>)>, f64) {
        let n = y_onehot.nrows() as f64;
        let output = &activations[activations.len() - 1];

        let mut loss = -output
            .iter()
            .zip(y_onehot.iter())
            .filter(|(_, t)| **t > 0.0)
            .map(|(&p, _)| p.max(1e-10).ln())
            .sum::<f64>()
            / n;
        let l2: f64 = self.weights.iter().map(|w| w.iter().map(|v| v * v).sum::<f64>()).sum();
        loss += 0.5 * self.config.alpha * l2 / n;

        let mut gradients = Vec::with_capacity(self.weights.len());
        let mut delta = (output - y_onehot) / n;

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];
            let grad_w = a_prev.t().dot(&delta) + &self.weights[i] * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));

            if i > 0 {
                let relu_grad = activations[i].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.weights[i].t()) * relu_grad;
            }
            gradients.push((grad_w, grad_b));
        }

        gradients.reverse();
        (gradients, loss)
    }

    fn adam_step(&mut self, state: &mut AdamState, gradients: Vec<(Array2<f64>, Array1<f64>)>) {
        state.t += 1;
        let lr = self.config.learning_rate * (1.0 - BETA_2.powi(state.t)).sqrt()
            / (1.0 - BETA_1.powi(state.t));

        for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
            state.m_w[i] = &state.m_w[i] * BETA_1 + &grad_w * (1.0 - BETA_1);
            state.v_w[i] = &state.v_w[i] * BETA_2 + &grad_w.mapv(|g| g * g) * (1.0 - BETA_2);
            state.m_b[i] = &state.m_b[i] * BETA_1 + &grad_b * (1.0 - BETA_1);
            state.v_b[i] = &state.v_b[i] * BETA_2 + &grad_b.mapv(|g| g * g) * (1.0 - BETA_2);

            let step_w = &state.m_w[i] / &state.v_w[i].mapv(|v| v.sqrt() + EPSILON) * lr;
            let step_b = &state.m_b[i] / &state.v_b[i].mapv(|v| v.sqrt() + EPSILON) * lr;
            self.weights[i] -= &step_w;
            self.biases[i] -= &step_b;
        }
    }

    fn parameters_finite(&self) -> bool {
        self.weights.iter().all(|w| w.iter().all(|v| v.is_finite()))
            && self.biases.iter().all(|b| b.iter().all(|v| v.is_finite()))
    }

    fn to_onehot(&self, y: &Array1<usize>) -> Array2<f64> {
        let mut onehot = Array2::zeros((y.len(), self.n_classes));
        for (i, &label) in y.iter().enumerate() {
            onehot[[i, label]] = 1.0;
        }
        onehot
    }

    fn accuracy_on(&self, x: &Array2<f64>, y: &Array1<usize>) -> f64 {
        let output = self.forward(x).pop().unwrap_or_else(|| Array2::zeros((0, 0)));
        let correct = output
            .rows()
            .into_iter()
            .zip(y.iter())
            .filter(|(row, label)| argmax(row.iter().copied()) == **label)
            .count();
        correct as f64 / y.len().max(1) as f64
    }
}

impl TrainableClassifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        check_fit_input(x, y, n_classes)?;

        let n_parameters = parameter_count(x.ncols(), &self.config.hidden_layers, n_classes);
        if n_parameters > MAX_PARAMETERS {
            return Err(BuilderError::hyperparameter(
                "hidden_layers",
                format!(
                    "network would have {} parameters for {} features, at most {} are allowed",
                    n_parameters,
                    x.ncols(),
                    MAX_PARAMETERS
                ),
            ));
        }

        self.n_features = x.ncols();
        self.n_classes = n_classes;
        self.is_fitted = false;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.initialize_weights(&mut rng);

        // Optional validation hold-out
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let (train_idx, val_idx) = if self.config.early_stopping && x.nrows() > 1 {
            order.shuffle(&mut rng);
            let n_val = ((x.nrows() as f64 * VALIDATION_FRACTION).ceil() as usize)
                .clamp(1, x.nrows() - 1);
            let val = order.split_off(x.nrows() - n_val);
            (order, val)
        } else {
            (order, Vec::new())
        };

        let x_train = gather_rows(x, &train_idx);
        let y_train = self.to_onehot(&y.select(Axis(0), &train_idx));
        let x_val = gather_rows(x, &val_idx);
        let y_val = y.select(Axis(0), &val_idx);

        let n_train = x_train.nrows();
        let batch_size = n_train.min(MAX_BATCH_SIZE).max(1);
        let mut state = AdamState::new(&self.weights, &self.biases);

        let mut best_loss = f64::INFINITY;
        let mut best_score = f64::NEG_INFINITY;
        let mut best_params: Option<(Vec<Array2<f64>>, Vec<Array1<f64>>)> = None;
        let mut no_improvement = 0usize;
        let mut converged = false;
        let mut indices: Vec<usize> = (0..n_train).collect();

        self.n_iter = 0;
        for epoch in 0..self.config.max_iter {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in indices.chunks(batch_size) {
                let x_batch = gather_rows(&x_train, batch);
                let y_batch = gather_rows(&y_train, batch);

                let activations = self.forward(&x_batch);
                let (gradients, batch_loss) = self.backward(&y_batch, &activations);
                epoch_loss += batch_loss * batch.len() as f64;
                self.adam_step(&mut state, gradients);
            }

            self.loss = epoch_loss / n_train as f64;
            self.n_iter = epoch + 1;
            if !self.loss.is_finite() {
                return Err(diverged(epoch + 1));
            }

            if self.config.early_stopping && !val_idx.is_empty() {
                let score = self.accuracy_on(&x_val, &y_val);
                if score < best_score + self.config.tol {
                    no_improvement += 1;
                } else {
                    no_improvement = 0;
                }
                if score > best_score {
                    best_score = score;
                    best_params = Some((self.weights.clone(), self.biases.clone()));
                }
            } else {
                if self.loss > best_loss - self.config.tol {
                    no_improvement += 1;
                } else {
                    no_improvement = 0;
                }
                if self.loss < best_loss {
                    best_loss = self.loss;
                }
            }

            if no_improvement > self.config.n_iter_no_change {
                debug!(epoch = epoch + 1, loss = self.loss, "MLP stopped: no improvement");
                converged = true;
                break;
            }
        }

        if let Some((weights, biases)) = best_params {
            self.weights = weights;
            self.biases = biases;
        }

        if !self.parameters_finite() {
            return Err(diverged(self.n_iter));
        }

        if !converged {
            warn!(
                max_iter = self.config.max_iter,
                loss = self.loss,
                "MLP reached max_iter without converging"
            );
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| argmax(row.iter().copied()))
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

fn diverged(epoch: usize) -> BuilderError {
    BuilderError::DataError(format!(
        "MLP training diverged at epoch {} (non-finite weights); try a smaller learning_rate",
        epoch
    ))
}

fn softmax(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    z
}

/// Index of the first maximum
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}
