//! Doc Cache server
//!
//! Serves the student and teacher collections over HTTP with cached reads
//! and cache-invalidating transactional writes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_cache::api::create_router;
use doc_cache::{
    spawn_cleanup_task, AppState, CacheBackend, Config, DocumentStore, MemoryBackend,
    MemoryDocumentStore,
};

/// Main entry point for the Doc Cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the document store and the cache backend
/// 4. Start background TTL cleanup task for the in-memory backend
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Doc Cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_ttl={}s, cache_timeout={}ms, populate={:?}, port={}, cleanup_interval={}s",
        config.cache_ttl,
        config.cache_timeout_ms,
        config.populate,
        config.server_port,
        config.cleanup_interval
    );

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let (backend, cleanup_handle) = build_backend(&config).await;
    let state = AppState::from_config(&config, store, backend);
    info!("Query cache initialized");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Picks the cache backend. An unreachable Redis falls back to the in-memory
/// backend, since the cache only ever speeds reads up.
async fn build_backend(config: &Config) -> (Arc<dyn CacheBackend>, Option<JoinHandle<()>>) {
    if let Some(url) = &config.redis_url {
        let timeout = Duration::from_millis(config.cache_timeout_ms);
        if let Some(backend) = connect_redis(url, timeout).await {
            return (backend, None);
        }
    }

    let backend = Arc::new(MemoryBackend::new());
    let cleanup = spawn_cleanup_task(
        backend.clone(),
        Duration::from_secs(config.cleanup_interval.max(1)),
    );
    info!("Background cleanup task started");

    let shared: Arc<dyn CacheBackend> = backend;
    (shared, Some(cleanup))
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str, timeout: Duration) -> Option<Arc<dyn CacheBackend>> {
    match doc_cache::cache::RedisBackend::connect(url, timeout).await {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            warn!("{}; falling back to in-memory cache", err);
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(url: &str, _timeout: Duration) -> Option<Arc<dyn CacheBackend>> {
    warn!(
        "REDIS_URL={} ignored: built without the `redis` feature, using in-memory cache",
        url
    );
    None
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
