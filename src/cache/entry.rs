//! Cache Entry Module
//!
//! A cached query result payload and its expiry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Cache Entry ==
/// A serialized query result held under one field of a namespace.
///
/// Backends that store text (Redis) keep the whole entry as a JSON envelope,
/// so every field carries its own expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized result payload, opaque to the store
    pub payload: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry created at `now_ms` that lives for `ttl`.
    pub fn new(payload: String, ttl: Duration, now_ms: u64) -> Self {
        Self {
            payload,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl.as_millis() as u64),
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now_ms` reaches its expiration time.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }

    /// Age in milliseconds at `now_ms`.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at)
    }

    // == Envelope ==
    /// Encodes the entry as the JSON text stored by text backends.
    pub fn to_envelope(&self) -> Result<String, CacheError> {
        serde_json::to_string(self)
            .map_err(|e| CacheError::Unavailable(format!("unencodable cache entry: {}", e)))
    }

    /// Decodes an envelope, returning `None` when it is unreadable or
    /// expired at `now_ms`.
    pub fn from_envelope(raw: &str, now_ms: u64) -> Option<Self> {
        serde_json::from_str::<Self>(raw)
            .ok()
            .filter(|entry| !entry.is_expired_at(now_ms))
    }
}
