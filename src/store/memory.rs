//! In-Memory Document Store
//!
//! Collections of JSON documents with staged, all-or-nothing transactions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::filter::{compare_values, matches, validate};
use super::{document_id, Document, DocumentStore, TxHandle, ID_FIELD};
use crate::error::StoreError;
use crate::query::{QueryOptions, SortDirection};

/// A write waiting for its transaction to commit.
#[derive(Debug, Clone)]
enum StagedOp {
    Insert { collection: String, document: Document },
    Replace { collection: String, document: Document },
    Remove { collection: String, id: String },
}

type Collections = HashMap<String, Vec<Document>>;

// == Memory Document Store ==
/// Documents are kept in insertion order per collection.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
    transactions: Mutex<HashMap<u64, Vec<StagedOp>>>,
    next_tx: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Number of transactions neither committed nor aborted.
    pub async fn open_transactions(&self) -> usize {
        self.transactions.lock().await.len()
    }

    /// The committed collection with this transaction's staged writes applied.
    async fn view(&self, ops: &[StagedOp], collection: &str) -> Vec<Document> {
        let mut docs = self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();
        for op in ops {
            apply_unchecked(&mut docs, collection, op);
        }
        docs
    }

    async fn staged(&self, tx: TxHandle) -> Result<Vec<StagedOp>, StoreError> {
        self.transactions
            .lock()
            .await
            .get(&tx.id())
            .cloned()
            .ok_or(StoreError::UnknownTransaction(tx.id()))
    }

    async fn stage(&self, tx: TxHandle, op: StagedOp) -> Result<(), StoreError> {
        self.transactions
            .lock()
            .await
            .get_mut(&tx.id())
            .map(|ops| ops.push(op))
            .ok_or(StoreError::UnknownTransaction(tx.id()))
    }
}

fn op_collection(op: &StagedOp) -> &str {
    match op {
        StagedOp::Insert { collection, .. }
        | StagedOp::Replace { collection, .. }
        | StagedOp::Remove { collection, .. } => collection,
    }
}

fn position(docs: &[Document], id: &str) -> Option<usize> {
    docs.iter().position(|d| document_id(d) == Some(id))
}

fn apply_unchecked(docs: &mut Vec<Document>, collection: &str, op: &StagedOp) {
    if op_collection(op) != collection {
        return;
    }
    match op {
        StagedOp::Insert { document, .. } => docs.push(document.clone()),
        StagedOp::Replace { document, .. } => {
            if let Some(pos) = document_id(document).and_then(|id| position(docs, id)) {
                docs[pos] = document.clone();
            }
        }
        StagedOp::Remove { id, .. } => {
            if let Some(pos) = position(docs, id) {
                docs.remove(pos);
            }
        }
    }
}

/// Applies one staged write to committed data, failing on a conflicting
/// concurrent commit.
fn apply_checked(collections: &mut Collections, op: &StagedOp) -> Result<(), StoreError> {
    let docs = collections.entry(op_collection(op).to_string()).or_default();
    let conflict = |id: &str| StoreError::Backend(format!("write conflict on {}/{}", op_collection(op), id));

    match op {
        StagedOp::Insert { document, .. } => {
            let id = document_id(document).unwrap_or_default();
            if position(docs, id).is_some() {
                return Err(conflict(id));
            }
            docs.push(document.clone());
        }
        StagedOp::Replace { document, .. } => {
            let id = document_id(document).unwrap_or_default();
            let pos = position(docs, id).ok_or_else(|| conflict(id))?;
            docs[pos] = document.clone();
        }
        StagedOp::Remove { id, .. } => {
            let pos = position(docs, id).ok_or_else(|| conflict(id))?;
            docs.remove(pos);
        }
    }
    Ok(())
}

fn sort_documents(docs: &mut [Document], options: &QueryOptions) {
    if options.sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in &options.sort {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ord = match key.direction {
                SortDirection::Asc => compare_values(left, right),
                SortDirection::Desc => compare_values(right, left),
            };
            if ord.is_ne() {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn project(document: Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return document;
    }
    document
        .into_iter()
        .filter(|(k, _)| k == ID_FIELD || fields.iter().any(|f| f == k))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Value,
        options: &QueryOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let conditions = validate(filter)?;
        let mut docs: Vec<Document> = self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, conditions)).cloned().collect())
            .unwrap_or_default();

        sort_documents(&mut docs, options);

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => usize::MAX,
        };
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| project(d, &options.projection))
            .collect())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Value,
    ) -> Result<Option<Document>, StoreError> {
        let conditions = validate(filter)?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, conditions)).cloned()))
    }

    async fn begin_transaction(&self) -> Result<TxHandle, StoreError> {
        let tx = TxHandle::new(self.next_tx.fetch_add(1, Ordering::SeqCst) + 1);
        self.transactions.lock().await.insert(tx.id(), Vec::new());
        debug!(%tx, "transaction started");
        Ok(tx)
    }

    async fn insert(
        &self,
        tx: TxHandle,
        collection: &str,
        mut document: Document,
    ) -> Result<Document, StoreError> {
        let ops = self.staged(tx).await?;
        let id = match document.get(ID_FIELD) {
            None => Uuid::new_v4().to_string(),
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(_) => {
                return Err(StoreError::InvalidDocument(
                    "_id must be a non-empty string".to_string(),
                ))
            }
        };
        if position(&self.view(&ops, collection).await, &id).is_some() {
            return Err(StoreError::InvalidDocument(format!(
                "duplicate _id {} in {}",
                id, collection
            )));
        }
        document.insert(ID_FIELD.to_string(), Value::String(id));

        self.stage(
            tx,
            StagedOp::Insert {
                collection: collection.to_string(),
                document: document.clone(),
            },
        )
        .await?;
        Ok(document)
    }

    async fn update(
        &self,
        tx: TxHandle,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Document, StoreError> {
        let ops = self.staged(tx).await?;
        let docs = self.view(&ops, collection).await;
        let mut document = position(&docs, id)
            .map(|pos| docs[pos].clone())
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (field, value) in patch {
            if field != ID_FIELD {
                document.insert(field, value);
            }
        }

        self.stage(
            tx,
            StagedOp::Replace {
                collection: collection.to_string(),
                document: document.clone(),
            },
        )
        .await?;
        Ok(document)
    }

    async fn delete(
        &self,
        tx: TxHandle,
        collection: &str,
        id: &str,
    ) -> Result<Document, StoreError> {
        let ops = self.staged(tx).await?;
        let docs = self.view(&ops, collection).await;
        let document = position(&docs, id)
            .map(|pos| docs[pos].clone())
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        self.stage(
            tx,
            StagedOp::Remove {
                collection: collection.to_string(),
                id: id.to_string(),
            },
        )
        .await?;
        Ok(document)
    }

    async fn commit(&self, tx: TxHandle) -> Result<(), StoreError> {
        let mut transactions = self.transactions.lock().await;
        let ops = transactions
            .get(&tx.id())
            .ok_or(StoreError::UnknownTransaction(tx.id()))?;

        // Validate against a copy so a conflict leaves committed data untouched
        let mut collections = self.collections.write().await;
        let mut next = collections.clone();
        for op in ops {
            apply_checked(&mut next, op)?;
        }
        *collections = next;
        transactions.remove(&tx.id());

        debug!(%tx, "transaction committed");
        Ok(())
    }

    async fn abort(&self, tx: TxHandle) -> Result<(), StoreError> {
        self.transactions
            .lock()
            .await
            .remove(&tx.id())
            .map(|_| debug!(%tx, "transaction aborted"))
            .ok_or(StoreError::UnknownTransaction(tx.id()))
    }
}
