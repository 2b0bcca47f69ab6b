//! Workflow orchestration shared by the HTTP server and the CLI
//!
//! Each operation is one synchronous step against one session: load it,
//! validate, do the work, write it back.

use crate::config::AppConfig;
use crate::error::{BuilderError, Result};
use crate::export::ArtifactPersister;
use crate::frame::{column_names, preview_records};
use crate::preprocessing::PreprocessingPlanner;
use crate::report::{MetricsReport, ReportFormat};
use crate::session::{Durability, SessionStore, SessionSummary, TrainedModel};
use crate::training::{ModelKind, ModelSpec, TrainResult, TrainingEngine};
use polars::prelude::DataFrame;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Rows shown in the ingestion preview
pub const PREVIEW_ROWS: usize = 5;
/// Held-out fraction when a train request does not name one
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub session_id: String,
    pub preview: Vec<Map<String, Value>>,
    pub num_rows: usize,
    pub num_cols: usize,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PreprocessRequest {
    pub session_id: String,
    pub method: String,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessSummary {
    pub method: String,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_rows_with_missing_target: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreprocessResponse {
    pub message: String,
    pub summary: PreprocessSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub session_id: String,
    pub model_type: String,
    pub test_size: Option<f64>,
    /// Model hyperparameters; keys a model does not use are ignored
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainResponse {
    pub message: String,
    pub model_type: String,
    pub metrics: TrainResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Stored metrics in the requested presentation
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricsResponse {
    Full {
        model_type: String,
        metrics: TrainResult,
        confusion_matrix: Vec<Vec<u64>>,
        confusion_matrix_html: String,
    },
    Html {
        confusion_matrix_html: String,
    },
}

#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub session_id: String,
    pub model_type: String,
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub model_type: String,
    pub path: PathBuf,
}

fn warnings_for(durability: &Durability) -> Vec<String> {
    durability.warning().into_iter().collect()
}

/// The model-building workflow over a session store
pub struct WorkflowService {
    store: Arc<SessionStore>,
    persister: ArtifactPersister,
    engine: TrainingEngine,
}

impl WorkflowService {
    pub fn new(store: Arc<SessionStore>, persister: ArtifactPersister) -> Self {
        Self {
            store,
            persister,
            engine: TrainingEngine::new(),
        }
    }

    pub fn with_engine(mut self, engine: TrainingEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Build the store described by `config`. A configured but unreachable
    /// durable tier falls back to local-only storage.
    pub async fn from_config(config: &AppConfig) -> Self {
        let store = match &config.redis_url {
            Some(url) => durable_store(url).await,
            None => SessionStore::local_only(),
        };
        Self::new(Arc::new(store), ArtifactPersister::new(&config.models_dir))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn persister(&self) -> &ArtifactPersister {
        &self.persister
    }

    /// Start a session around an already parsed dataset
    pub async fn ingest(&self, dataset: DataFrame) -> Result<IngestResponse> {
        let preview = preview_records(&dataset, PREVIEW_ROWS);
        let num_rows = dataset.height();
        let num_cols = dataset.width();
        let columns = column_names(&dataset);

        let (session_id, durability) = self.store.create(dataset).await;
        Ok(IngestResponse {
            session_id,
            preview,
            num_rows,
            num_cols,
            columns,
            warnings: warnings_for(&durability),
        })
    }

    /// Analyze the session's dataset and store a fresh preprocessing plan.
    /// A rejected request leaves the session unchanged.
    pub async fn preprocess(&self, request: &PreprocessRequest) -> Result<PreprocessResponse> {
        let mut session = self.store.get(&request.session_id).await?;
        let prepared =
            PreprocessingPlanner::prepare(session.dataset(), &request.target_column, &request.method)?;

        let config = prepared.config.clone();
        let dropped = prepared.dropped_rows;
        session.apply_preprocessing(prepared);
        let durability = self.store.put(session).await;

        let summary = PreprocessSummary {
            method: config
                .method
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            target_column: config.target_column,
            feature_columns: config.feature_columns,
            numeric_columns: config.numeric_columns,
            categorical_columns: config.categorical_columns,
            dropped_rows_with_missing_target: (dropped > 0).then_some(dropped),
        };
        info!(session_id = %request.session_id, method = %summary.method, "Session preprocessed");

        Ok(PreprocessResponse {
            message: "Preprocessing configured.".to_string(),
            summary,
            warnings: warnings_for(&durability),
        })
    }

    /// Fit and evaluate one model type, replacing any earlier result for it.
    /// Fitting runs on the blocking pool.
    pub async fn train(&self, request: &TrainRequest) -> Result<TrainResponse> {
        let mut session = self.store.get(&request.session_id).await?;
        let prepared = session.prepared().ok_or(BuilderError::NotConfigured)?;

        let kind: ModelKind = request.model_type.parse()?;
        let spec = ModelSpec::from_params(kind, &request.params)?;
        let test_size = request.test_size.unwrap_or(DEFAULT_TEST_SIZE);

        let features = prepared.features.clone();
        let target = prepared.target.clone();
        let preprocessor = prepared.preprocessor.clone();
        let engine = self.engine.clone();
        let (pipeline, result) = tokio::task::spawn_blocking(move || {
            engine.train(&features, &target, &preprocessor, &spec, test_size)
        })
        .await
        .map_err(|e| BuilderError::Internal(format!("training task failed: {}", e)))??;

        let model_type = kind.as_str().to_string();
        session.insert_model(
            model_type.clone(),
            TrainedModel {
                pipeline,
                result: result.clone(),
            },
        );
        let durability = self.store.put(session).await;

        Ok(TrainResponse {
            message: "Model trained successfully.".to_string(),
            model_type,
            metrics: result,
            warnings: warnings_for(&durability),
        })
    }

    /// Metrics stored by the last training call for `model_type`
    pub async fn metrics(
        &self,
        session_id: &str,
        model_type: &str,
        format: ReportFormat,
    ) -> Result<MetricsResponse> {
        let session = self.store.get(session_id).await?;
        let key = canonical_model_key(model_type);
        let model = session
            .model(&key)
            .ok_or_else(|| BuilderError::NoTrainedModel(key.clone()))?;

        let report = MetricsReport::render(&model.result);
        Ok(match format {
            ReportFormat::Html => MetricsResponse::Html {
                confusion_matrix_html: report.confusion_matrix_html,
            },
            ReportFormat::Json => MetricsResponse::Full {
                model_type: key,
                metrics: model.result.clone(),
                confusion_matrix: report.confusion_matrix,
                confusion_matrix_html: report.confusion_matrix_html,
            },
        })
    }

    /// Write the session's pipeline for `model_type` as a named artifact
    pub async fn save_model(&self, request: &SaveRequest) -> Result<SaveResponse> {
        let session = self.store.get(&request.session_id).await?;
        let key = canonical_model_key(&request.model_type);
        let model = session
            .model(&key)
            .ok_or_else(|| BuilderError::NoTrainedModel(key.clone()))?;

        let path = self.persister.save(&model.pipeline, &request.model_name)?;
        Ok(SaveResponse {
            message: "Model saved.".to_string(),
            model_type: key,
            path,
        })
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }
}

/// Canonical storage key for a model type name; unknown names pass through
/// lower-cased so lookups report them as untrained
fn canonical_model_key(model_type: &str) -> String {
    model_type
        .parse::<ModelKind>()
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|_| model_type.trim().to_ascii_lowercase())
}

#[cfg(feature = "redis_backend")]
async fn durable_store(url: &str) -> SessionStore {
    use crate::session::RedisTier;

    match RedisTier::connect(url).await {
        Ok(tier) => SessionStore::with_durable(Arc::new(tier)),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, sessions will be kept in memory only");
            SessionStore::local_only()
        }
    }
}

#[cfg(not(feature = "redis_backend"))]
async fn durable_store(_url: &str) -> SessionStore {
    warn!("REDIS_URL is set but this build lacks the redis_backend feature; sessions will be kept in memory only");
    SessionStore::local_only()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn service() -> (WorkflowService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = WorkflowService::new(
            Arc::new(SessionStore::local_only()),
            ArtifactPersister::new(dir.path()),
        );
        (service, dir)
    }

    fn dataset() -> DataFrame {
        let x: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { i as f64 } else { i as f64 + 50.0 }).collect();
        let y: Vec<&str> = (0..20).map(|i| if i % 2 == 0 { "even" } else { "odd" }).collect();
        df! { "x" => &x, "y" => &y }.unwrap()
    }

    #[test]
    fn test_canonical_model_key() {
        assert_eq!(canonical_model_key("Backpropagation"), "mlp");
        assert_eq!(canonical_model_key("DECISION_TREE"), "decision_tree");
        assert_eq!(canonical_model_key(" SVM "), "svm");
    }

    #[tokio::test]
    async fn test_ingest_preview() {
        let (service, _dir) = service();
        let response = service.ingest(dataset()).await.unwrap();
        assert_eq!(response.num_rows, 20);
        assert_eq!(response.num_cols, 2);
        assert_eq!(response.preview.len(), PREVIEW_ROWS);
        assert_eq!(response.columns, vec!["x", "y"]);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_train_before_preprocess() {
        let (service, _dir) = service();
        let session_id = service.ingest(dataset()).await.unwrap().session_id;
        let err = service
            .train(&TrainRequest {
                session_id,
                model_type: "perceptron".into(),
                test_size: None,
                params: Map::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BuilderError::NotConfigured));
    }

    #[tokio::test]
    async fn test_alias_stored_under_canonical_key() {
        let (service, _dir) = service();
        let session_id = service.ingest(dataset()).await.unwrap().session_id;
        service
            .preprocess(&PreprocessRequest {
                session_id: session_id.clone(),
                method: "normalization".into(),
                target_column: "y".into(),
            })
            .await
            .unwrap();

        let mut params = Map::new();
        params.insert("hidden_layers".into(), Value::from(4));
        params.insert("max_iter".into(), Value::from(20));
        let response = service
            .train(&TrainRequest {
                session_id: session_id.clone(),
                model_type: "multilayer_perceptron".into(),
                test_size: Some(0.25),
                params,
            })
            .await
            .unwrap();
        assert_eq!(response.model_type, "mlp");

        let session = service.store().get(&session_id).await.unwrap();
        assert_eq!(session.model_types(), vec!["mlp"]);
        assert!(service.metrics(&session_id, "backpropagation", ReportFormat::Json).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_untrained_model() {
        let (service, _dir) = service();
        let session_id = service.ingest(dataset()).await.unwrap().session_id;
        let err = service
            .save_model(&SaveRequest {
                session_id,
                model_type: "perceptron".into(),
                model_name: "m".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BuilderError::NoTrainedModel(_)));
    }
}
