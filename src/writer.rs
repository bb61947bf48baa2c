//! Transactional Writer
//!
//! Applies one mutation inside a document store transaction and invalidates
//! the collection's cached queries only after the commit is acknowledged.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::QueryCache;
use crate::error::{StoreError, WriteError};
use crate::store::{Document, DocumentStore, TxHandle};

// == Mutation ==
/// A single-document write.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(Document),
    Update { id: String, patch: Document },
    Delete { id: String },
}

impl Mutation {
    fn verb(&self) -> &'static str {
        match self {
            Mutation::Insert(_) => "insert",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

// == Transaction State ==
/// Lifecycle of one `mutate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Started,
    Applied,
    Committed,
    Aborted,
    FailedBeforeApply,
}

// == Transactional Writer ==
#[derive(Clone)]
pub struct TransactionalWriter {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
}

impl TransactionalWriter {
    pub fn new(store: Arc<dyn DocumentStore>, cache: QueryCache) -> Self {
        Self { store, cache }
    }

    /// Runs `mutation` against `collection` as one transaction.
    ///
    /// On commit the collection's cache namespace is dropped; a failed drop
    /// is logged and the write still succeeds. On any store failure the
    /// transaction is rolled back, the cache is left alone, and the store
    /// error is returned.
    pub async fn mutate(
        &self,
        collection: &str,
        mutation: Mutation,
    ) -> Result<Document, WriteError> {
        let verb = mutation.verb();
        let tx = match self.store.begin_transaction().await {
            Ok(tx) => tx,
            Err(source) => {
                warn!(collection, verb, state = ?TxState::FailedBeforeApply, error = %source, "mutation not submitted");
                return Err(WriteError::FailedBeforeApply { source });
            }
        };
        debug!(collection, verb, %tx, state = ?TxState::Started);

        let document = match self.apply(tx, collection, mutation).await {
            Ok(document) => document,
            Err(source) => return Err(self.rollback(tx, collection, TxState::Started, source).await),
        };
        debug!(collection, verb, %tx, state = ?TxState::Applied);

        if let Err(source) = self.store.commit(tx).await {
            return Err(self.rollback(tx, collection, TxState::Applied, source).await);
        }
        info!(collection, verb, %tx, state = ?TxState::Committed, "mutation committed");

        // Strictly after the commit acknowledgement
        if let Err(err) = self.cache.invalidate_collection(collection).await {
            error!(collection, %tx, error = %err, "cache invalidation failed, entries stay stale until TTL");
        }

        Ok(document)
    }

    async fn apply(
        &self,
        tx: TxHandle,
        collection: &str,
        mutation: Mutation,
    ) -> Result<Document, StoreError> {
        match mutation {
            Mutation::Insert(document) => self.store.insert(tx, collection, document).await,
            Mutation::Update { id, patch } => self.store.update(tx, collection, &id, patch).await,
            Mutation::Delete { id } => self.store.delete(tx, collection, &id).await,
        }
    }

    async fn rollback(
        &self,
        tx: TxHandle,
        collection: &str,
        state: TxState,
        source: StoreError,
    ) -> WriteError {
        if let Err(abort_err) = self.store.abort(tx).await {
            warn!(collection, %tx, error = %abort_err, "abort after failure did not succeed");
        }
        warn!(collection, %tx, state = ?TxState::Aborted, after = ?state, error = %source, "mutation rolled back");
        WriteError::TransactionAborted { state, source }
    }
}
