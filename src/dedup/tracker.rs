//! Message deduplication tracker.
//!
//! [`DedupTracker`] decides whether a message ID has already been handled and
//! records handling outcomes in a [`KeyValueStore`]. It keeps no state of its
//! own: every decision is a fresh read of the store, so any number of
//! trackers (in one process or many) can share a store.
//!
//! `is_processed` followed by `mark_processed` is check-then-act. Two
//! deliveries of the same ID arriving together can both see "not processed".
//! Use [`DedupTracker::claim`] when the store supports `put_if_absent`.

use std::collections::HashMap;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::dedup::observer::{DedupEvent, DedupObserver, TracingObserver};
use crate::dedup::policy::Operation;
use crate::dedup::record::{Metadata, ProcessingRecord};
use crate::error::{Error, Result};
use crate::store::{KeyValueStore, PutOptions, StoredValue, ValueFormat};

/// Result of a [`DedupTracker::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller owns the message and should process it.
    Claimed,
    /// A fresh record already exists; skip the message.
    AlreadyProcessed,
}

impl ClaimOutcome {
    pub fn is_claimed(self) -> bool {
        matches!(self, ClaimOutcome::Claimed)
    }
}

/// Static tracker configuration as reported by [`DedupTracker::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub key_prefix: String,
    pub ttl_seconds: u64,
    pub retry_window_ms: u64,
    pub expiry: &'static str,
}

/// Idempotency tracker over a key-value store.
#[derive(Clone)]
pub struct DedupTracker {
    store: Arc<dyn KeyValueStore>,
    config: Arc<TrackerConfig>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn DedupObserver>,
}

impl fmt::Debug for DedupTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DedupTracker {
    /// Create a tracker using the system clock and `tracing` for events.
    pub fn new(store: Arc<dyn KeyValueStore>, config: TrackerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the event receiver.
    pub fn with_observer(mut self, observer: Arc<dyn DedupObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Check whether `msg_id` was handled within the retry window.
    ///
    /// Returns `false` for an empty ID, a missing record, a record older than
    /// the retry window, or any store failure (fail-open). A message is never
    /// dropped because the store was unreachable.
    pub async fn is_processed(&self, msg_id: &str) -> bool {
        if msg_id.is_empty() {
            self.emit(DedupEvent::EmptyMessageId {
                operation: Operation::IsProcessed,
            });
            return false;
        }

        match self.lookup(msg_id).await {
            Ok(None) => {
                self.emit(DedupEvent::NotFound {
                    msg_id: msg_id.to_string(),
                });
                false
            }
            Ok(Some(record)) => {
                let now = self.clock.now();
                let age_millis = record.age_millis(now);
                if record.is_within_window(now, self.retry_window()) {
                    self.emit(DedupEvent::Duplicate {
                        msg_id: msg_id.to_string(),
                        age_millis,
                    });
                    true
                } else {
                    self.emit(DedupEvent::RetryEligible {
                        msg_id: msg_id.to_string(),
                        age_millis,
                    });
                    false
                }
            }
            Err(e) => {
                self.store_failure(Operation::IsProcessed, msg_id, &e);
                false
            }
        }
    }

    /// Record that `msg_id` was handled.
    ///
    /// Returns `true` only when the store confirmed the write. A `false`
    /// means deduplication is not guaranteed for this ID; the work itself has
    /// already happened, so this never returns an error.
    pub async fn mark_processed(&self, msg_id: &str, metadata: Metadata) -> bool {
        if msg_id.is_empty() {
            self.emit(DedupEvent::EmptyMessageId {
                operation: Operation::MarkProcessed,
            });
            return false;
        }

        let record = ProcessingRecord::new(msg_id, metadata, self.clock.now());
        let result = match serde_json::to_string(&record) {
            Ok(payload) => self
                .store
                .put(&self.config.key_for(msg_id), payload, self.put_options())
                .await
                .map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };

        match result {
            Ok(()) => {
                self.emit(DedupEvent::Marked {
                    msg_id: msg_id.to_string(),
                    ttl_seconds: self.config.expiration_ttl,
                });
                true
            }
            Err(e) => {
                self.store_failure(Operation::MarkProcessed, msg_id, &e);
                false
            }
        }
    }

    /// Read the stored record for `msg_id`.
    ///
    /// Missing, unparseable and unreadable records all come back as `None`.
    pub async fn get_process_info(&self, msg_id: &str) -> Option<ProcessingRecord> {
        if msg_id.is_empty() {
            self.emit(DedupEvent::EmptyMessageId {
                operation: Operation::GetProcessInfo,
            });
            return None;
        }

        match self.lookup(msg_id).await {
            Ok(record) => record,
            Err(e) => {
                self.store_failure(Operation::GetProcessInfo, msg_id, &e);
                None
            }
        }
    }

    /// Check many IDs at once.
    ///
    /// Lookups run concurrently on the calling task, so no runtime is
    /// required beyond whatever polls the returned future. If any lookup
    /// panics, every ID is reported as unprocessed. When an ID appears more
    /// than once, a single `false` wins.
    pub async fn check_multiple<S: AsRef<str>>(&self, msg_ids: &[S]) -> HashMap<String, bool> {
        let lookups = msg_ids.iter().map(|msg_id| {
            let msg_id = msg_id.as_ref();
            AssertUnwindSafe(async move { (msg_id, self.is_processed(msg_id).await) })
                .catch_unwind()
        });

        let mut results = HashMap::with_capacity(msg_ids.len());
        for outcome in join_all(lookups).await {
            match outcome {
                Ok((msg_id, processed)) => {
                    results
                        .entry(msg_id.to_string())
                        .and_modify(|seen: &mut bool| *seen &= processed)
                        .or_insert(processed);
                }
                Err(payload) => {
                    self.emit(DedupEvent::BatchFailure {
                        batch_size: msg_ids.len(),
                        error: panic_message(payload.as_ref()),
                    });
                    return msg_ids
                        .iter()
                        .map(|msg_id| (msg_id.as_ref().to_string(), false))
                        .collect();
                }
            }
        }

        results
    }

    /// Delete the record for `msg_id`, returning any store error.
    ///
    /// Deleting an absent record succeeds.
    pub async fn remove(&self, msg_id: &str) -> Result<()> {
        if msg_id.is_empty() {
            self.emit(DedupEvent::EmptyMessageId {
                operation: Operation::Remove,
            });
            return Err(Error::EmptyMessageId);
        }

        if let Err(e) = self.store.delete(&self.config.key_for(msg_id)).await {
            let e = Error::from(e);
            self.store_failure(Operation::Remove, msg_id, &e);
            return Err(e);
        }

        self.emit(DedupEvent::Removed {
            msg_id: msg_id.to_string(),
            operation: Operation::Remove,
        });
        Ok(())
    }

    /// Delete the record for `msg_id`, reporting success as a flag.
    pub async fn clear(&self, msg_id: &str) -> bool {
        if msg_id.is_empty() {
            self.emit(DedupEvent::EmptyMessageId {
                operation: Operation::Clear,
            });
            return false;
        }

        match self.store.delete(&self.config.key_for(msg_id)).await {
            Ok(()) => {
                self.emit(DedupEvent::Removed {
                    msg_id: msg_id.to_string(),
                    operation: Operation::Clear,
                });
                true
            }
            Err(e) => {
                self.store_failure(Operation::Clear, msg_id, &e);
                false
            }
        }
    }

    /// Atomically claim `msg_id` for processing.
    ///
    /// Writes the record with the store's `put_if_absent`. If a record
    /// already exists and is fresh, the message is reported as already
    /// processed. A stale record is overwritten and the claim succeeds; that
    /// takeover is a plain write and is not atomic.
    ///
    /// Store errors, including stores without `put_if_absent`, are returned.
    pub async fn claim(&self, msg_id: &str, metadata: Metadata) -> Result<ClaimOutcome> {
        if msg_id.is_empty() {
            self.emit(DedupEvent::EmptyMessageId {
                operation: Operation::Claim,
            });
            return Err(Error::EmptyMessageId);
        }

        let now = self.clock.now();
        let record = ProcessingRecord::new(msg_id, metadata, now);
        let payload = serde_json::to_string(&record)?;
        let key = self.config.key_for(msg_id);

        let created = self
            .store
            .put_if_absent(&key, payload.clone(), self.put_options())
            .await
            .map_err(|e| self.claim_failure(msg_id, Error::from(e)))?;

        if created {
            self.emit(DedupEvent::Claimed {
                msg_id: msg_id.to_string(),
                takeover: false,
            });
            return Ok(ClaimOutcome::Claimed);
        }

        let existing = self
            .lookup(msg_id)
            .await
            .map_err(|e| self.claim_failure(msg_id, e))?;

        if let Some(existing) = existing {
            if existing.is_within_window(now, self.retry_window()) {
                self.emit(DedupEvent::Duplicate {
                    msg_id: msg_id.to_string(),
                    age_millis: existing.age_millis(now),
                });
                return Ok(ClaimOutcome::AlreadyProcessed);
            }
        }

        self.store
            .put(&key, payload, self.put_options())
            .await
            .map_err(|e| self.claim_failure(msg_id, Error::from(e)))?;

        self.emit(DedupEvent::Claimed {
            msg_id: msg_id.to_string(),
            takeover: true,
        });
        Ok(ClaimOutcome::Claimed)
    }

    /// Static configuration. The store offers no way to count records, so
    /// there are no live counters.
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            key_prefix: self.config.key_prefix.clone(),
            ttl_seconds: self.config.expiration_ttl,
            retry_window_ms: self.config.retry_window_ms,
            expiry: "managed by the store (TTL-based)",
        }
    }

    async fn lookup(&self, msg_id: &str) -> Result<Option<ProcessingRecord>> {
        let value = self
            .store
            .get(&self.config.key_for(msg_id), ValueFormat::Json)
            .await?
            .and_then(StoredValue::into_json);

        let Some(value) = value else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    fn retry_window(&self) -> Duration {
        self.config.retry_window()
    }

    fn put_options(&self) -> PutOptions {
        PutOptions {
            ttl_seconds: self.config.expiration_ttl,
        }
    }

    fn claim_failure(&self, msg_id: &str, e: Error) -> Error {
        self.store_failure(Operation::Claim, msg_id, &e);
        e
    }

    fn store_failure(&self, operation: Operation, msg_id: &str, error: &dyn fmt::Display) {
        self.emit(DedupEvent::StoreFailure {
            operation,
            msg_id: msg_id.to_string(),
            policy: operation.failure_policy(),
            error: error.to_string(),
        });
    }

    fn emit(&self, event: DedupEvent) {
        self.observer.on_event(&event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "lookup panicked".to_string())
}
