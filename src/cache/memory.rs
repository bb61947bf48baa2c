//! In-Memory Cache Backend
//!
//! Namespaced HashMap storage with per-entry TTL expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheBackend, CacheEntry, Clock, SystemClock};
use crate::error::CacheError;

type Namespace = HashMap<String, CacheEntry>;

// == Memory Backend ==
/// Process-local cache store: namespace -> field -> entry.
#[derive(Debug)]
pub struct MemoryBackend {
    namespaces: RwLock<HashMap<String, Namespace>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty backend on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty backend driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            clock,
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and drops namespaces left empty.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut namespaces = self.namespaces.write().await;

        let mut removed = 0;
        for entries in namespaces.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            removed += before - entries.len();
        }
        namespaces.retain(|_, entries| !entries.is_empty());

        removed
    }

    // == Length ==
    /// Returns the number of stored entries across all namespaces,
    /// including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.namespaces.read().await.values().map(HashMap::len).sum()
    }

    /// Returns the number of stored entries in one namespace.
    pub async fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, HashMap::len)
    }

    // == Is Empty ==
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now_ms();
        // Write lock: expired entries are removed on access
        let mut namespaces = self.namespaces.write().await;
        let Some(entries) = namespaces.get_mut(namespace) else {
            return Ok(None);
        };

        match entries.get(field) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired_at(now) => {
                debug!(
                    namespace,
                    age_ms = entry.age_ms(now),
                    ttl_remaining_ms = entry.ttl_remaining_ms(now),
                    "entry read"
                );
                return Ok(Some(entry.payload.clone()));
            }
            Some(_) => {}
        }

        entries.remove(field);
        if entries.is_empty() {
            namespaces.remove(namespace);
        }
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
        let entry = CacheEntry::new(payload, ttl, self.clock.now_ms());
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(field.to_string(), entry);
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        let removed = self.namespaces.write().await.remove(namespace);
        debug!(
            namespace,
            entries = removed.map_or(0, |entries| entries.len()),
            "namespace deleted"
        );
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    const TTL: Duration = Duration::from_secs(300);

    fn backend() -> (Arc<ManualClock>, MemoryBackend) {
        let clock = Arc::new(ManualClock::new(0));
        let backend = MemoryBackend::with_clock(clock.clone());
        (clock, backend)
    }

    #[tokio::test]
    async fn test_backend_new() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.len().await, 0);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_, backend) = backend();

        backend.set("student", "k1", "[1]".to_string(), TTL).await.unwrap();
        let value = backend.get("student", "k1").await.unwrap();

        assert_eq!(value.as_deref(), Some("[1]"));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_, backend) = backend();

        assert_eq!(backend.get("student", "nope").await.unwrap(), None);
        backend.set("student", "k1", "[]".to_string(), TTL).await.unwrap();
        assert_eq!(backend.get("student", "nope").await.unwrap(), None);
        assert_eq!(backend.get("teacher", "k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_siblings() {
        let (_, backend) = backend();

        backend.set("student", "k1", "a".to_string(), TTL).await.unwrap();
        backend.set("student", "k2", "b".to_string(), TTL).await.unwrap();
        backend.set("student", "k1", "c".to_string(), TTL).await.unwrap();

        assert_eq!(backend.get("student", "k1").await.unwrap().as_deref(), Some("c"));
        assert_eq!(backend.get("student", "k2").await.unwrap().as_deref(), Some("b"));
        assert_eq!(backend.namespace_len("student").await, 2);
    }

    #[tokio::test]
    async fn test_delete_namespace() {
        let (_, backend) = backend();

        backend.set("student", "k1", "a".to_string(), TTL).await.unwrap();
        backend.set("student", "k2", "b".to_string(), TTL).await.unwrap();
        backend.set("teacher", "k1", "c".to_string(), TTL).await.unwrap();

        backend.delete_namespace("student").await.unwrap();

        assert_eq!(backend.get("student", "k1").await.unwrap(), None);
        assert_eq!(backend.get("student", "k2").await.unwrap(), None);
        assert_eq!(backend.get("teacher", "k1").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_delete_missing_namespace_is_noop() {
        let (_, backend) = backend();

        assert!(backend.delete_namespace("student").await.is_ok());
        assert!(backend.delete_namespace("student").await.is_ok());
    }

    #[tokio::test]
    async fn test_later_sibling_does_not_extend_entry() {
        let (clock, backend) = backend();
        let day = Duration::from_secs(24 * 60 * 60);

        backend.set("student", "a", "[1]".to_string(), day).await.unwrap();
        clock.advance(Duration::from_secs(23 * 60 * 60));
        backend.set("student", "b", "[2]".to_string(), day).await.unwrap();
        clock.advance(Duration::from_secs(60 * 60));

        assert_eq!(backend.get("student", "a").await.unwrap(), None);
        assert!(backend.get("student", "b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let (clock, backend) = backend();

        backend
            .set("student", "k1", "a".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(backend.get("student", "k1").await.unwrap().is_some());

        clock.advance(Duration::from_millis(1_000));

        assert_eq!(backend.get("student", "k1").await.unwrap(), None);
        assert!(backend.is_empty().await, "Expired entry should be removed on read");
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (clock, backend) = backend();

        backend
            .set("student", "k1", "a".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        backend
            .set("student", "k2", "b".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        backend
            .set("teacher", "k1", "c".to_string(), Duration::from_secs(1))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(2));

        let removed = backend.cleanup_expired().await;
        assert_eq!(removed, 2);
        assert_eq!(backend.len().await, 1);
        assert_eq!(backend.namespace_len("teacher").await, 0);
        assert!(backend.get("student", "k2").await.unwrap().is_some());
    }
}
