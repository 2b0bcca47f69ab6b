//! Two-tier session registry: local map in front of an optional durable tier

use super::{DurableTier, Session, SessionSummary};
use crate::error::{BuilderError, Result};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const KEY_PREFIX: &str = "session:";

fn durable_key(session_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, session_id)
}

/// Outcome of a write. A failed write-through is reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    /// No durable tier configured
    LocalOnly,
    Persisted,
    /// Stored locally only; the durable write failed
    Degraded { reason: String },
}

impl Durability {
    /// Message for the caller's `warnings` list, if any
    pub fn warning(&self) -> Option<String> {
        match self {
            Durability::Degraded { reason } => {
                Some(format!("Session was not persisted to the durable store: {}", reason))
            }
            _ => None,
        }
    }
}

/// Session registry shared by every request
pub struct SessionStore {
    local: RwLock<HashMap<String, Session>>,
    durable: Option<Arc<dyn DurableTier>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::local_only()
    }
}

impl SessionStore {
    pub fn local_only() -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            durable: None,
        }
    }

    pub fn with_durable(durable: Arc<dyn DurableTier>) -> Self {
        info!(tier = durable.name(), "Session store using durable tier");
        Self {
            local: RwLock::new(HashMap::new()),
            durable: Some(durable),
        }
    }

    pub fn has_durable_tier(&self) -> bool {
        self.durable.is_some()
    }

    /// Mint a new session around `dataset` and store it
    pub async fn create(&self, dataset: DataFrame) -> (String, Durability) {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), dataset);
        info!(
            session_id = %session_id,
            rows = session.dataset().height(),
            cols = session.dataset().width(),
            "Session created"
        );
        let durability = self.put(session).await;
        (session_id, durability)
    }

    /// Local tier first, then the durable tier. A durable hit repopulates the
    /// local tier. Unreadable durable entries count as missing.
    pub async fn get(&self, session_id: &str) -> Result<Session> {
        if let Some(session) = self.local.read().await.get(session_id) {
            debug!(session_id = %session_id, "Session cache hit");
            return Ok(session.clone());
        }
        debug!(session_id = %session_id, "Session cache miss");

        let durable = match &self.durable {
            Some(durable) => durable,
            None => return Err(BuilderError::NotFound(session_id.to_string())),
        };

        let bytes = match durable.get(&durable_key(session_id)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(BuilderError::NotFound(session_id.to_string())),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Durable session read failed");
                return Err(BuilderError::NotFound(session_id.to_string()));
            }
        };

        match Session::from_bytes(&bytes) {
            Ok(session) => {
                self.local
                    .write()
                    .await
                    .insert(session_id.to_string(), session.clone());
                debug!(session_id = %session_id, "Session restored from durable tier");
                Ok(session)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Discarding unreadable durable session");
                Err(BuilderError::NotFound(session_id.to_string()))
            }
        }
    }

    /// Full replace under the session's own id. Always succeeds locally.
    pub async fn put(&self, session: Session) -> Durability {
        let session_id = session.id().to_string();
        let encoded = self.durable.as_ref().map(|_| session.to_bytes());
        self.local.write().await.insert(session_id.clone(), session);

        let (durable, encoded) = match (&self.durable, encoded) {
            (Some(durable), Some(encoded)) => (durable, encoded),
            _ => return Durability::LocalOnly,
        };

        let result = match encoded {
            Ok(bytes) => durable.set(&durable_key(&session_id), &bytes).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Durability::Persisted,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to persist session to durable tier");
                Durability::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Summaries from the durable tier when configured, else the local tier
    pub async fn list(&self) -> Vec<SessionSummary> {
        if let Some(durable) = &self.durable {
            match self.list_durable(durable.as_ref()).await {
                Ok(summaries) => return summaries,
                Err(e) => warn!(error = %e, "Failed to list sessions from durable tier"),
            }
        }

        let mut summaries: Vec<SessionSummary> =
            self.local.read().await.values().map(Session::summary).collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        summaries
    }

    async fn list_durable(&self, durable: &dyn DurableTier) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for key in durable.keys(KEY_PREFIX).await? {
            let session_id = key.trim_start_matches(KEY_PREFIX).to_string();
            let summary = match durable.get(&key).await {
                Ok(Some(bytes)) => match Session::from_bytes(&bytes) {
                    Ok(session) => session.summary(),
                    Err(_) => empty_summary(session_id),
                },
                Ok(None) => empty_summary(session_id),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable durable session");
                    continue;
                }
            };
            summaries.push(summary);
        }
        Ok(summaries)
    }

    pub async fn health_check(&self) -> Result<()> {
        match &self.durable {
            Some(durable) => durable.health_check().await,
            None => Ok(()),
        }
    }
}

fn empty_summary(session_id: String) -> SessionSummary {
    SessionSummary {
        session_id,
        rows: 0,
        has_preprocessor: false,
        num_models: 0,
        models: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemoryTier;
    use polars::prelude::*;

    fn dataset() -> DataFrame {
        df! { "a" => &[1.0, 2.0, 3.0], "y" => &["p", "q", "p"] }.unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_local() {
        let store = SessionStore::local_only();
        let (id, durability) = store.create(dataset()).await;
        assert_eq!(durability, Durability::LocalOnly);
        assert_eq!(id.len(), 36);
        assert_eq!(store.get(&id).await.unwrap().dataset().height(), 3);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = SessionStore::local_only();
        assert!(matches!(store.get("nope").await, Err(BuilderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_durable_key_format() {
        let tier = Arc::new(InMemoryTier::new());
        let store = SessionStore::with_durable(tier.clone());
        let (id, durability) = store.create(dataset()).await;
        assert_eq!(durability, Durability::Persisted);
        assert_eq!(tier.keys("session:").await.unwrap(), vec![format!("session:{}", id)]);
    }

    #[tokio::test]
    async fn test_read_through_repopulates() {
        let tier = Arc::new(InMemoryTier::new());
        let writer = SessionStore::with_durable(tier.clone());
        let (id, _) = writer.create(dataset()).await;

        let reader = SessionStore::with_durable(tier);
        assert!(reader.local.read().await.is_empty());
        let session = reader.get(&id).await.unwrap();
        assert_eq!(session.id(), id);
        assert!(reader.local.read().await.contains_key(&id));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_missing() {
        let tier = Arc::new(InMemoryTier::new());
        tier.set("session:broken", b"garbage").await.unwrap();
        let store = SessionStore::with_durable(tier);
        assert!(matches!(store.get("broken").await, Err(BuilderError::NotFound(_))));
    }

    /// Tier that fails reads for keys ending in `bad`
    struct PartlyReadableTier(InMemoryTier);

    #[async_trait::async_trait]
    impl DurableTier for PartlyReadableTier {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            if key.ends_with("bad") {
                return Err(BuilderError::PersistenceWarning("read timed out".into()));
            }
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            self.0.set(key, value).await
        }

        async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
            self.0.keys(prefix).await
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "partly-readable"
        }
    }

    #[tokio::test]
    async fn test_list_skips_failing_reads() {
        let tier = Arc::new(PartlyReadableTier(InMemoryTier::new()));
        tier.set("session:bad", b"whatever").await.unwrap();
        let store = SessionStore::with_durable(tier);
        let (id, _) = store.create(dataset()).await;

        let listed = store.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, id);
        assert_eq!(listed[0].rows, 3);
    }

    #[tokio::test]
    async fn test_degraded_warning_text() {
        let outcome = Durability::Degraded { reason: "down".into() };
        assert!(outcome.warning().unwrap().contains("down"));
        assert!(Durability::Persisted.warning().is_none());
    }
}
