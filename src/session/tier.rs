//! Durable key-value tier behind the session store

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Byte-oriented store that outlives the process.
///
/// Implementations report failures as `BuilderError::PersistenceWarning`;
/// the session store decides how to degrade.
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    async fn health_check(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Process-local tier. Behaves like a durable store for the lifetime of the
/// value, so several `SessionStore`s sharing one instance see each other's
/// writes.
#[derive(Debug, Default)]
pub struct InMemoryTier {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DurableTier for InMemoryTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
