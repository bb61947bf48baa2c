//! Document Store Module
//!
//! The transactional document store the cache sits in front of.

mod filter;
mod memory;

pub use filter::{compare_values, matches};
pub use memory::MemoryDocumentStore;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::query::QueryOptions;

/// A stored document. Its identity lives in the `_id` field.
pub type Document = Map<String, Value>;

/// Name of the identity field of every document.
pub const ID_FIELD: &str = "_id";

// == Transaction Handle ==
/// Identifies an open transaction. Writes made through it become visible
/// to readers only when it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(u64);

impl TxHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

// == Document Store ==
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Committed documents of `collection` matching `filter`, shaped by `options`.
    async fn find(
        &self,
        collection: &str,
        filter: &Value,
        options: &QueryOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// First committed document of `collection` matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Value)
        -> Result<Option<Document>, StoreError>;

    async fn begin_transaction(&self) -> Result<TxHandle, StoreError>;

    /// Stages an insert. An `_id` is assigned when the document has none.
    async fn insert(
        &self,
        tx: TxHandle,
        collection: &str,
        document: Document,
    ) -> Result<Document, StoreError>;

    /// Stages a merge of `patch` into the document `id`; returns the new version.
    async fn update(
        &self,
        tx: TxHandle,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Document, StoreError>;

    /// Stages removal of the document `id`; returns the removed version.
    async fn delete(&self, tx: TxHandle, collection: &str, id: &str)
        -> Result<Document, StoreError>;

    /// Makes every staged write visible at once, or none of them.
    async fn commit(&self, tx: TxHandle) -> Result<(), StoreError>;

    /// Discards every staged write.
    async fn abort(&self, tx: TxHandle) -> Result<(), StoreError>;
}

/// Returns the `_id` of a document as a string, if it has one.
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}
