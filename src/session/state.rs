//! Per-session workflow state and its durable snapshot encoding

use crate::error::{BuilderError, Result};
use crate::frame::{from_ipc_bytes, to_ipc_bytes};
use crate::preprocessing::{FeaturePreprocessor, PreparedData, PreprocessConfig};
use crate::training::{FittedPipeline, TrainResult};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of a successful preprocessing call. `features` and `target` always
/// have the same height and `features` holds exactly `config.feature_columns`.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub config: PreprocessConfig,
    pub preprocessor: FeaturePreprocessor,
    pub features: DataFrame,
    pub target: Series,
}

/// A trained pipeline together with the metrics of the run that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub pipeline: FittedPipeline,
    pub result: TrainResult,
}

/// Unit of workflow state, created on ingestion
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    dataset: DataFrame,
    prepared: Option<Prepared>,
    models: BTreeMap<String, TrainedModel>,
}

impl Session {
    pub fn new(id: impl Into<String>, dataset: DataFrame) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            dataset,
            prepared: None,
            models: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn dataset(&self) -> &DataFrame {
        &self.dataset
    }

    pub fn prepared(&self) -> Option<&Prepared> {
        self.prepared.as_ref()
    }

    /// Replace the preprocessing state wholesale. The stored dataset becomes
    /// the cleaned one (rows with a missing target removed).
    pub fn apply_preprocessing(&mut self, data: PreparedData) {
        self.dataset = data.dataset;
        self.prepared = Some(Prepared {
            config: data.config,
            preprocessor: data.preprocessor,
            features: data.features,
            target: data.target,
        });
    }

    pub fn model(&self, model_type: &str) -> Option<&TrainedModel> {
        self.models.get(model_type)
    }

    /// Store a training outcome, replacing any earlier one for the same type
    pub fn insert_model(&mut self, model_type: impl Into<String>, model: TrainedModel) {
        self.models.insert(model_type.into(), model);
    }

    pub fn model_types(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            rows: self.dataset.height(),
            has_preprocessor: self.prepared.is_some(),
            num_models: self.models.len(),
            models: self.model_types(),
        }
    }

    /// Encode for the durable tier
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let prepared = match &self.prepared {
            Some(p) => Some(PreparedSnapshot {
                config: p.config.clone(),
                preprocessor: p.preprocessor.clone(),
                features: to_ipc_bytes(&p.features)?,
                target: to_ipc_bytes(&DataFrame::new(vec![p.target.clone().into()])?)?,
            }),
            None => None,
        };
        let snapshot = SessionSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            dataset: to_ipc_bytes(&self.dataset)?,
            prepared,
            models: self.models.clone(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: SessionSnapshot = bincode::deserialize(bytes)?;
        let prepared = match snapshot.prepared {
            Some(p) => {
                let features = from_ipc_bytes(&p.features)?;
                let target_frame = from_ipc_bytes(&p.target)?;
                let target = target_frame
                    .get_columns()
                    .first()
                    .ok_or_else(|| {
                        BuilderError::SerializationError("snapshot target is empty".to_string())
                    })?
                    .as_materialized_series()
                    .clone();
                if features.height() != target.len() {
                    return Err(BuilderError::SerializationError(format!(
                        "snapshot features have {} rows but target has {}",
                        features.height(),
                        target.len()
                    )));
                }
                Some(Prepared {
                    config: p.config,
                    preprocessor: p.preprocessor,
                    features,
                    target,
                })
            }
            None => None,
        };
        Ok(Self {
            id: snapshot.id,
            created_at: snapshot.created_at,
            dataset: from_ipc_bytes(&snapshot.dataset)?,
            prepared,
            models: snapshot.models,
        })
    }
}

/// Debug listing entry for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub rows: usize,
    pub has_preprocessor: bool,
    pub num_models: usize,
    pub models: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct PreparedSnapshot {
    config: PreprocessConfig,
    preprocessor: FeaturePreprocessor,
    features: Vec<u8>,
    target: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SessionSnapshot {
    id: String,
    created_at: DateTime<Utc>,
    dataset: Vec<u8>,
    prepared: Option<PreparedSnapshot>,
    models: BTreeMap<String, TrainedModel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::PreprocessingPlanner;

    fn dataset() -> DataFrame {
        df! {
            "a" => &[1.0, 2.0, 3.0, 4.0],
            "color" => &["red", "blue", "red", "green"],
            "label" => &[Some("x"), None, Some("y"), Some("x")],
        }
        .unwrap()
    }

    #[test]
    fn test_new_session_is_bare() {
        let session = Session::new("abc", dataset());
        let summary = session.summary();
        assert_eq!(summary.rows, 4);
        assert!(!summary.has_preprocessor);
        assert_eq!(summary.num_models, 0);
    }

    #[test]
    fn test_apply_preprocessing_replaces_dataset() {
        let mut session = Session::new("abc", dataset());
        let prepared = PreprocessingPlanner::prepare(session.dataset(), "label", "onehot").unwrap();
        session.apply_preprocessing(prepared);

        assert_eq!(session.dataset().height(), 3);
        let p = session.prepared().unwrap();
        assert_eq!(p.features.height(), p.target.len());
        assert_eq!(p.config.feature_columns, vec!["a", "color"]);
    }

    #[test]
    fn test_snapshot_restores_state() {
        let mut session = Session::new("abc", dataset());
        let prepared = PreprocessingPlanner::prepare(session.dataset(), "label", "normalization").unwrap();
        session.apply_preprocessing(prepared);

        let restored = Session::from_bytes(&session.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.id(), "abc");
        assert_eq!(restored.created_at(), session.created_at());
        assert!(restored.dataset().equals_missing(session.dataset()));
        let (a, b) = (restored.prepared().unwrap(), session.prepared().unwrap());
        assert_eq!(a.config, b.config);
        assert_eq!(a.preprocessor, b.preprocessor);
        assert!(a.features.equals_missing(&b.features));
        assert_eq!(a.target.len(), b.target.len());
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(Session::from_bytes(b"not a snapshot").is_err());
    }
}
