//! Doc Cache - read-through / write-invalidate caching for a document store
//!
//! Query results are cached per collection namespace under a key derived
//! from the query's shape. Committed writes drop the whole namespace.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod store;
pub mod tasks;
pub mod writer;

pub use api::AppState;
pub use cache::{CacheBackend, MemoryBackend, QueryCache, QueryCacheConfig};
pub use config::Config;
pub use query::{CacheKey, KeyCodec, QuerySpec};
pub use store::{DocumentStore, MemoryDocumentStore};
pub use tasks::spawn_cleanup_task;
pub use writer::{Mutation, TransactionalWriter, TxState};
