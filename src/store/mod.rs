//! Key-value store capability consumed by the tracker.
//!
//! The tracker only needs three primitives from its backing store: `get`,
//! `put` with a TTL, and `delete`. Stores may optionally offer an atomic
//! `put_if_absent`, which enables [`DedupTracker::claim`](crate::DedupTracker::claim).
//!
//! Provided backends:
//! - [`MemoryStore`]: in-process map with lazy expiry
//! - [`FileStore`]: one JSON envelope file per key

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Requested representation of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFormat {
    /// Parse the stored text as JSON.
    #[default]
    Json,
    /// Return the stored text unchanged.
    Text,
}

/// A value read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Json(Value),
    Text(String),
}

impl StoredValue {
    /// Consume the value, returning the JSON form if present.
    pub fn into_json(self) -> Option<Value> {
        match self {
            StoredValue::Json(value) => Some(value),
            StoredValue::Text(_) => None,
        }
    }
}

/// Options for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions {
    /// Lifetime of the entry; the store removes it once this elapses.
    pub ttl_seconds: u64,
}

/// Per-key, auto-expiring key-value store.
///
/// Implementations must be safe for concurrent use from many tasks. Writes
/// are expected to be visible to later reads of the same key, but no
/// cross-replica ordering is assumed.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw text stored under `key`, or `None` if absent or expired.
    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any existing entry.
    async fn put(&self, key: &str, value: String, options: PutOptions) -> StoreResult<()>;

    /// Remove `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Store `value` only if no live entry exists for `key`.
    ///
    /// Returns `true` when the entry was written. Stores without an atomic
    /// conditional write keep the default, which reports `Unsupported`.
    async fn put_if_absent(
        &self,
        _key: &str,
        _value: String,
        _options: PutOptions,
    ) -> StoreResult<bool> {
        Err(StoreError::Unsupported("put_if_absent"))
    }

    /// Read `key` in the requested format.
    async fn get(&self, key: &str, format: ValueFormat) -> StoreResult<Option<StoredValue>> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(None);
        };

        match format {
            ValueFormat::Text => Ok(Some(StoredValue::Text(raw))),
            ValueFormat::Json => serde_json::from_str(&raw)
                .map(|value| Some(StoredValue::Json(value)))
                .map_err(|e| StoreError::Serialization(format!("{}: {}", key, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_json_and_text() {
        let store = MemoryStore::new();
        let options = PutOptions { ttl_seconds: 60 };
        store
            .put("k", r#"{"a":1}"#.to_string(), options)
            .await
            .unwrap();

        let json = store.get("k", ValueFormat::Json).await.unwrap();
        assert_eq!(json, Some(StoredValue::Json(serde_json::json!({"a": 1}))));

        let text = store.get("k", ValueFormat::Text).await.unwrap();
        assert_eq!(text, Some(StoredValue::Text(r#"{"a":1}"#.to_string())));
    }

    #[tokio::test]
    async fn test_get_rejects_malformed_json() {
        let store = MemoryStore::new();
        store
            .put("k", "not json".to_string(), PutOptions { ttl_seconds: 60 })
            .await
            .unwrap();

        let result = store.get("k", ValueFormat::Json).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing", ValueFormat::Json).await.unwrap(), None);
    }
}
