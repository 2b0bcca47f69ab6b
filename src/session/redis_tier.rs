//! Redis-backed durable tier

use super::DurableTier;
use crate::error::{BuilderError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

/// Durable tier over a multiplexed Redis connection. Entries have no expiry.
#[derive(Clone)]
pub struct RedisTier {
    conn: ConnectionManager,
}

impl RedisTier {
    /// Connect to `url` (`redis://host:port/db`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BuilderError::PersistenceWarning(format!("invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| BuilderError::PersistenceWarning(format!("Redis connection failed: {}", e)))?;
        info!("Connected to Redis session tier");
        Ok(Self { conn })
    }
}

fn redis_error(op: &str, err: redis::RedisError) -> BuilderError {
    BuilderError::PersistenceWarning(format!("Redis {} failed: {}", op, err))
}

#[async_trait]
impl DurableTier for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| redis_error("GET", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| redis_error("SET", e))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = conn
            .keys(format!("{}*", prefix))
            .await
            .map_err(|e| redis_error("KEYS", e))?;
        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("PING", e))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
