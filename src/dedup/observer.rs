//! Observability port for the tracker.
//!
//! The tracker never logs directly. It reports structured [`DedupEvent`]s to
//! an injected [`DedupObserver`]; [`TracingObserver`] forwards them to
//! `tracing`.

use std::sync::Mutex;

use crate::dedup::policy::{FailurePolicy, Operation};

/// Something noteworthy that happened inside the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupEvent {
    /// An operation was called with an empty message ID.
    EmptyMessageId { operation: Operation },
    /// No record exists for the ID.
    NotFound { msg_id: String },
    /// A fresh record exists; the delivery should be suppressed.
    Duplicate { msg_id: String, age_millis: i64 },
    /// A record exists but is older than the retry window.
    RetryEligible { msg_id: String, age_millis: i64 },
    /// A record was written.
    Marked { msg_id: String, ttl_seconds: u64 },
    /// A record was claimed atomically, or taken over after going stale.
    Claimed { msg_id: String, takeover: bool },
    /// A record was deleted.
    Removed { msg_id: String, operation: Operation },
    /// The store failed and the operation applied its failure policy.
    StoreFailure {
        operation: Operation,
        msg_id: String,
        policy: FailurePolicy,
        error: String,
    },
    /// The batch fan-out/fan-in failed; every ID was reported unprocessed.
    BatchFailure { batch_size: usize, error: String },
}

/// Receiver for tracker events.
pub trait DedupObserver: Send + Sync {
    fn on_event(&self, event: &DedupEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DedupObserver for TracingObserver {
    fn on_event(&self, event: &DedupEvent) {
        match event {
            DedupEvent::EmptyMessageId { operation } => {
                tracing::warn!(%operation, "Empty message ID, treating as not processed");
            }
            DedupEvent::NotFound { msg_id } => {
                tracing::debug!(msg_id = %msg_id, "No processing record");
            }
            DedupEvent::Duplicate { msg_id, age_millis } => {
                tracing::info!(msg_id = %msg_id, age_millis, "Duplicate delivery suppressed");
            }
            DedupEvent::RetryEligible { msg_id, age_millis } => {
                tracing::info!(
                    msg_id = %msg_id,
                    age_millis,
                    "Record older than retry window, allowing reprocessing"
                );
            }
            DedupEvent::Marked {
                msg_id,
                ttl_seconds,
            } => {
                tracing::debug!(msg_id = %msg_id, ttl_seconds, "Marked as processed");
            }
            DedupEvent::Claimed { msg_id, takeover } => {
                tracing::debug!(msg_id = %msg_id, takeover, "Claimed message");
            }
            DedupEvent::Removed { msg_id, operation } => {
                tracing::debug!(msg_id = %msg_id, %operation, "Record removed");
            }
            DedupEvent::StoreFailure {
                operation,
                msg_id,
                policy,
                error,
            } => {
                tracing::error!(
                    %operation,
                    msg_id = %msg_id,
                    %policy,
                    "Store failure: {}",
                    error
                );
            }
            DedupEvent::BatchFailure { batch_size, error } => {
                tracing::error!(
                    batch_size,
                    "Batch check failed, reporting all as unprocessed: {}",
                    error
                );
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DedupObserver for NoopObserver {
    fn on_event(&self, _event: &DedupEvent) {}
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DedupEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<DedupEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl DedupObserver for RecordingObserver {
    fn on_event(&self, event: &DedupEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_event(&DedupEvent::NotFound { msg_id: "a".into() });
        observer.on_event(&DedupEvent::EmptyMessageId {
            operation: Operation::Clear,
        });

        assert_eq!(
            observer.events(),
            vec![
                DedupEvent::NotFound { msg_id: "a".into() },
                DedupEvent::EmptyMessageId {
                    operation: Operation::Clear
                },
            ]
        );
    }

    #[test]
    fn test_tracing_observer_handles_every_event() {
        let observer = TracingObserver;
        observer.on_event(&DedupEvent::StoreFailure {
            operation: Operation::IsProcessed,
            msg_id: "a".into(),
            policy: FailurePolicy::FailOpen,
            error: "down".into(),
        });
        observer.on_event(&DedupEvent::BatchFailure {
            batch_size: 3,
            error: "panic".into(),
        });
    }
}
