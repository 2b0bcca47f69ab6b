//! Model training module
//!
//! Provides the supervised training step of the workflow:
//! - Perceptron (one-vs-rest for multiclass)
//! - CART decision tree (Gini)
//! - Neural network (MLP, Adam)
//! - Stratified splitting, label encoding and macro-averaged metrics

mod classifier;
mod engine;
mod hyperparams;
mod labels;
mod pipeline;
pub mod decision_tree;
pub mod metrics;
pub mod neural_network;
pub mod perceptron;
pub mod split;

pub use classifier::{Estimator, TrainableClassifier};
pub use decision_tree::{DecisionTreeClassifier, TreeNode};
pub use engine::{TrainResult, TrainingEngine};
pub use hyperparams::{
    positive_float, positive_int, HiddenLayers, LayerSpecInput, ModelKind, ModelSpec,
    MAX_HIDDEN_LAYERS, MAX_LAYER_WIDTH,
};
pub use labels::LabelEncoder;
pub use metrics::MacroScores;
pub use neural_network::{MLPClassifier, MLPConfig};
pub use perceptron::Perceptron;
pub use pipeline::FittedPipeline;
pub use split::{stratified_split, SplitIndices, DEFAULT_SEED};
