//! Redis Cache Backend
//!
//! Each collection namespace is one Redis hash keyed `<prefix>:<namespace>`,
//! with one hash field per query. Each field holds a [`CacheEntry`] envelope
//! carrying its own expiry, and `get` treats an expired envelope as a miss
//! and drops it. Redis can only expire whole keys, so the hash itself gets
//! the TTL on every write; that bounds memory for idle namespaces but never
//! keeps an individual entry alive past its own TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info};

use crate::cache::{CacheBackend, CacheEntry, Clock, SystemClock};
use crate::error::CacheError;

const KEY_PREFIX: &str = "doc_cache";

// == Redis Backend ==
pub struct RedisBackend {
    conn: MultiplexedConnection,
    clock: Arc<dyn Clock>,
}

impl RedisBackend {
    /// Opens a multiplexed connection and checks it with `PING`, giving up
    /// after `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid Redis URL: {}", e)))?;

        let connecting = async {
            let conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| CacheError::Unavailable(format!("Redis connection failed: {}", e)))?;
            let backend = Self {
                conn,
                clock: Arc::new(SystemClock),
            };
            backend.ping().await?;
            Ok::<_, CacheError>(backend)
        };

        let backend = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| {
                CacheError::Unavailable(format!("Redis connection timed out after {:?}", timeout))
            })??;

        info!("Connected to Redis cache at {}", url);
        Ok(backend)
    }

    fn hash_key(namespace: &str) -> String {
        format!("{}:{}", KEY_PREFIX, namespace)
    }
}

fn unavailable(op: &str, err: redis::RedisError) -> CacheError {
    CacheError::Unavailable(format!("Redis {} failed: {}", op, err))
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let key = Self::hash_key(namespace);
        let raw = redis::cmd("HGET")
            .arg(&key)
            .arg(field)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| unavailable("HGET", e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        if let Some(entry) = CacheEntry::from_envelope(&raw, self.clock.now_ms()) {
            return Ok(Some(entry.payload));
        }

        // Expired or unreadable: drop it so the hash does not keep it
        redis::cmd("HDEL")
            .arg(&key)
            .arg(field)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| unavailable("HDEL", e))?;
        debug!(namespace, field, "expired entry removed on read");
        Ok(None)
    }

    async fn set(
        &self,
        namespace: &str,
        field: &str,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let envelope = CacheEntry::new(payload, ttl, self.clock.now_ms()).to_envelope()?;
        let mut conn = self.conn.clone();
        let key = Self::hash_key(namespace);
        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&key)
            .arg(field)
            .arg(envelope)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl.as_secs().max(1))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| unavailable("HSET", e))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::hash_key(namespace))
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("DEL", e))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("PING", e))
    }
}
