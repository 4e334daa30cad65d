//! Deduplication module.
//!
//! Provides:
//! - The store-backed idempotency tracker
//! - The persisted processing record
//! - Named per-operation failure policies
//! - An observability port for tracker events

pub mod observer;
pub mod policy;
pub mod record;
pub mod tracker;

pub use observer::{DedupEvent, DedupObserver, NoopObserver, RecordingObserver, TracingObserver};
pub use policy::{FailurePolicy, Operation};
pub use record::{Metadata, ProcessingRecord, RESERVED_FIELDS};
pub use tracker::{ClaimOutcome, DedupTracker, TrackerStats};
