//! Feature preprocessing
//!
//! Schema analysis, the impute + scale/encode pipeline and the planner that
//! wires a pipeline to a dataset:
//! - Median / most-frequent imputation
//! - Standard scaling (population variance)
//! - One-hot encoding over a sorted vocabulary

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod planner;
mod scaler;
mod schema;

pub use config::{PreprocessConfig, PreprocessMethod};
pub use encoder::OneHotEncoder;
pub use imputer::{median, most_frequent, MedianImputer, ModeImputer};
pub use pipeline::FeaturePreprocessor;
pub use planner::{drop_missing_target, PreparedData, PreprocessingPlanner};
pub use scaler::StandardScaler;
pub use schema::SchemaAnalyzer;
