//! ML Builder - session-scoped tabular model building
//!
//! This crate turns an uploaded table into a trained, evaluated and saved
//! classification pipeline, one step per call:
//! - Schema analysis and preprocessing (imputation, scaling, one-hot)
//! - Training with perceptron, decision tree or MLP classifiers
//! - Held-out evaluation with macro metrics and a confusion matrix
//! - Two-tier session storage so a workflow survives restarts
//! - Web server and CLI interfaces
//!
//! # Modules
//!
//! ## Core
//! - [`frame`] - Reading tables and extracting typed columns
//! - [`preprocessing`] - Schema analysis and the fitted feature pipeline
//! - [`training`] - Classifiers, splitting, metrics and the training engine
//! - [`report`] - Metric presentation (JSON, HTML, text)
//!
//! ## Workflow
//! - [`session`] - Session state and its local / durable storage
//! - [`export`] - Model artifacts on disk
//! - [`workflow`] - The operations both front ends call
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling and configuration
pub mod config;
pub mod error;

// Core ML modules
pub mod frame;
pub mod preprocessing;
pub mod report;
pub mod training;

// Workflow
pub mod export;
pub mod session;
pub mod workflow;

// Services
pub mod cli;
pub mod server;

pub use error::{BuilderError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling and configuration
    pub use crate::config::AppConfig;
    pub use crate::error::{BuilderError, Result};

    // Preprocessing
    pub use crate::preprocessing::{
        FeaturePreprocessor, PreprocessConfig, PreprocessMethod, PreprocessingPlanner,
        SchemaAnalyzer,
    };

    // Training
    pub use crate::training::{
        Estimator, FittedPipeline, ModelKind, ModelSpec, TrainResult, TrainableClassifier,
        TrainingEngine,
    };

    // Reporting
    pub use crate::report::{MetricsReport, ReportFormat};

    // Sessions and artifacts
    pub use crate::export::{ArtifactPersister, ModelArtifact};
    pub use crate::session::{Durability, DurableTier, InMemoryTier, Session, SessionStore};

    // Workflow
    pub use crate::workflow::WorkflowService;
}
