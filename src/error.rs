//! Error types for the query cache
//!
//! One thiserror enum per concern. Cache-side errors are absorbed by the
//! caching layer; store and write errors propagate to callers; `ApiError`
//! maps everything onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::writer::TxState;

// == Key Error ==
/// Cache key derivation failed. The query is executed without caching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("collection name cannot be empty")]
    EmptyCollection,

    #[error("filter must be a JSON object, got {0}")]
    FilterNotObject(&'static str),

    #[error("sort field '{0}' appears with conflicting directions")]
    ConflictingSort(String),

    #[error("failed to serialize canonical key: {0}")]
    Serialize(String),
}

// == Cache Error ==
/// Failures of the cache backend. Never surfaced to readers or writers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backend unreachable, timed out, or returned an unreadable payload
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Post-commit namespace delete failed
    #[error("invalidation of '{namespace}' failed: {reason}")]
    InvalidationFailed { namespace: String, reason: String },
}

// == Store Error ==
/// Failures reported by the document store. Always propagated unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Rejected input: a bad filter or document submitted by the caller
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A stored document that no longer decodes into its model
    #[error("malformed stored document: {0}")]
    Malformed(String),

    #[error("unknown or finished transaction: {0}")]
    UnknownTransaction(u64),

    #[error("document store error: {0}")]
    Backend(String),
}

// == Write Error ==
/// A mutation did not take effect. No cache invalidation was performed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The transaction could not be opened, nothing was submitted
    #[error("mutation could not be submitted: {source}")]
    FailedBeforeApply { source: StoreError },

    /// The transaction was rolled back
    #[error("transaction aborted after {state:?}: {source}")]
    TransactionAborted { state: TxState, source: StoreError },
}

impl WriteError {
    /// Returns the underlying document store error.
    pub fn store_error(&self) -> &StoreError {
        match self {
            WriteError::FailedBeforeApply { source } => source,
            WriteError::TransactionAborted { source, .. } => source,
        }
    }
}

// == Api Error ==
/// Unified error type for the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::InvalidDocument(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err.store_error() {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::InvalidDocument(msg) => ApiError::InvalidRequest(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP layer.
pub type Result<T> = std::result::Result<T, ApiError>;
