//! Query Cache
//!
//! Read-through caching of query results keyed by query shape, and
//! namespace-wide invalidation after committed writes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CacheStats, StatsRecorder};
use crate::config::DEFAULT_CACHE_TTL;
use crate::error::CacheError;
use crate::query::{CacheKey, QuerySpec};

// == Population ==
/// How a freshly executed result is written back to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    /// The read waits for the cache write to finish (or time out)
    Inline,
    /// The cache write runs on its own task; the read returns immediately
    Detached,
}

impl Population {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Population::Inline),
            "detached" => Some(Population::Detached),
            _ => None,
        }
    }
}

// == Query Cache Config ==
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Lifetime of a cached result
    pub ttl: Duration,
    /// Upper bound for any single backend call
    pub timeout: Duration,
    pub populate: Population,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL),
            timeout: Duration::from_millis(250),
            populate: Population::Detached,
        }
    }
}

// == Query Cache ==
/// Wraps query execution with a cache lookup and population step.
///
/// Cache trouble of any kind is logged and treated as a miss; only the
/// executor's own error ever reaches the caller. Concurrent misses on the
/// same key each run the executor.
#[derive(Clone)]
pub struct QueryCache {
    backend: Arc<dyn CacheBackend>,
    config: QueryCacheConfig,
    stats: Arc<StatsRecorder>,
}

impl QueryCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: QueryCacheConfig) -> Self {
        Self {
            backend,
            config,
            stats: Arc::new(StatsRecorder::new()),
        }
    }

    // == Execute ==
    /// Returns the cached result for `spec`, or runs `executor` and caches
    /// what it returns.
    ///
    /// `T` is the result shape the caller expects, typically `Vec<M>` for
    /// find-many and `Option<M>` for find-one. Executor errors propagate
    /// unchanged and are never cached.
    pub async fn execute<T, E, F, Fut>(&self, spec: &QuerySpec, executor: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match spec.cache_key() {
            Ok(key) => key,
            Err(err) => {
                warn!(collection = spec.collection(), error = %err, "cache key derivation failed, executing uncached");
                self.stats.record_bypass();
                return executor().await;
            }
        };

        if let Some(cached) = self.lookup::<T>(&key).await {
            debug!(key = %key, "Get from cache");
            self.stats.record_hit();
            return Ok(cached);
        }

        debug!(key = %key, "Get from document store");
        self.stats.record_miss();
        let result = executor().await?;
        self.populate(&key, &result).await;
        Ok(result)
    }

    // == Invalidate Collection ==
    /// Drops every cached result of `collection`. Safe to repeat.
    pub async fn invalidate_collection(&self, collection: &str) -> Result<(), CacheError> {
        let outcome = tokio::time::timeout(
            self.config.timeout,
            self.backend.delete_namespace(collection),
        )
        .await;

        let reason = match outcome {
            Ok(Ok(())) => {
                debug!(collection, "cache namespace invalidated");
                self.stats.record_invalidation();
                return Ok(());
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {:?}", self.config.timeout),
        };

        self.stats.record_invalidation_failure();
        Err(CacheError::InvalidationFailed {
            namespace: collection.to_string(),
            reason,
        })
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Checks that the backend answers within the configured timeout.
    pub async fn ping(&self) -> Result<(), CacheError> {
        match tokio::time::timeout(self.config.timeout, self.backend.ping()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Unavailable("ping timed out".to_string())),
        }
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let outcome = tokio::time::timeout(
            self.config.timeout,
            self.backend.get(key.namespace(), key.field()),
        )
        .await;

        let payload = match outcome {
            Ok(Ok(payload)) => payload?,
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                self.stats.record_unavailable();
                return None;
            }
            Err(_) => {
                warn!(key = %key, "cache read timed out, treating as miss");
                self.stats.record_unavailable();
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(err) => {
                // Overwritten by the population that follows this miss
                warn!(key = %key, error = %err, "cached payload unreadable, treating as miss");
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &CacheKey, result: &T) {
        let payload = match serde_json::to_string(result) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %key, error = %err, "result not serializable, not cached");
                return;
            }
        };

        let write = store_entry(
            self.backend.clone(),
            self.stats.clone(),
            key.clone(),
            payload,
            self.config.ttl,
            self.config.timeout,
        );

        match self.config.populate {
            Population::Inline => write.await,
            Population::Detached => {
                tokio::spawn(write);
            }
        }
    }
}

async fn store_entry(
    backend: Arc<dyn CacheBackend>,
    stats: Arc<StatsRecorder>,
    key: CacheKey,
    payload: String,
    ttl: Duration,
    timeout: Duration,
) {
    let outcome = tokio::time::timeout(
        timeout,
        backend.set(key.namespace(), key.field(), payload, ttl),
    )
    .await;

    match outcome {
        Ok(Ok(())) => stats.record_populated(),
        Ok(Err(err)) => {
            warn!(key = %key, error = %err, "cache population failed");
            stats.record_unavailable();
        }
        Err(_) => {
            warn!(key = %key, "cache population timed out");
            stats.record_unavailable();
        }
    }
}
