//! msg-dedup - message deduplication and idempotency tracking
//!
//! This library decides whether an inbound message ID has already been
//! handled and records handling outcomes in a TTL-based key-value store, so
//! that retried or duplicated deliveries are suppressed within a bounded
//! window.
//!
//! # Features
//!
//! - Store-backed dedup with automatic expiry (default 24h)
//! - Retry window: records older than 5 minutes allow reprocessing
//! - Concurrent batch checks
//! - Explicit per-operation failure policies (fail-open reads)
//! - Atomic claims on stores with `put_if_absent`
//! - In-memory and file-backed stores
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use msg_dedup::{DedupTracker, MemoryStore, Metadata, TrackerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tracker = DedupTracker::new(Arc::new(MemoryStore::new()), TrackerConfig::default());
//!
//!     if !tracker.is_processed("msg-123").await {
//!         // ... handle the message
//!         if !tracker.mark_processed("msg-123", Metadata::new()).await {
//!             // dedup not guaranteed for this message
//!         }
//!     }
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod output;
pub mod store;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, StoreBackend, StoreConfig, TrackerConfig};
pub use dedup::{
    ClaimOutcome, DedupEvent, DedupObserver, DedupTracker, FailurePolicy, Metadata, Operation,
    ProcessingRecord, TrackerStats, TracingObserver,
};
pub use error::{Error, Result};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
