//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired entries out of the
//! in-memory cache backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryBackend;

/// Spawns a background task that periodically removes expired cache entries.
///
/// Reads already ignore expired entries; the sweep only reclaims memory held
/// by entries nobody asks for again.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let backend = Arc::new(MemoryBackend::new());
/// let cleanup_handle = spawn_cleanup_task(backend.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(backend: Arc<MemoryBackend>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = backend.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, ManualClock};

    const INTERVAL: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
        backend
            .set("student", "k", "[]".to_string(), Duration::from_secs(1))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(backend.clone(), INTERVAL);
        clock.advance(Duration::from_secs(2));

        // Give the sweep a few intervals to run
        tokio::time::sleep(INTERVAL * 5).await;

        assert_eq!(backend.len().await, 0, "Expired entry should have been swept");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
        backend
            .set("student", "k", "[]".to_string(), Duration::from_secs(3600))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(backend.clone(), INTERVAL);
        clock.advance(Duration::from_secs(60));
        tokio::time::sleep(INTERVAL * 5).await;

        assert_eq!(backend.len().await, 1, "Valid entry should not be removed");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(Arc::new(MemoryBackend::new()), INTERVAL);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
