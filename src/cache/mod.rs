//! Cache Module
//!
//! Namespaced cache storage with TTL expiration and the read-through
//! query cache built on top of it.

mod clock;
mod entry;
mod memory;
mod query_cache;
#[cfg(feature = "redis")]
mod redis_backend;
mod stats;


use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use memory::MemoryBackend;
pub use query_cache::{Population, QueryCache, QueryCacheConfig};
#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;
pub use stats::{CacheStats, StatsRecorder};

// == Cache Backend ==
/// Key-value store holding serialized query results, grouped by namespace.
///
/// Every failure is reported as [`CacheError`]; callers treat it as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Reads one field of a namespace. `None` when absent or expired.
    async fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, CacheError>;

    /// Writes one field, replacing any previous payload for it.
    async fn set(
        &self,
        namespace: &str,
        field: &str,
        payload: String,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Removes every field of a namespace. A missing namespace is not an error.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), CacheError>;

    /// Connectivity check.
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
