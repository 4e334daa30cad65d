//! In-process key-value store with per-entry expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::store::{KeyValueStore, PutOptions, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Minimum time between full sweeps of expired entries.
const SWEEP_INTERVAL_SECONDS: i64 = 60;

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: DateTime<Utc>,
}

impl Entries {
    /// Drop every expired entry if the sweep interval has elapsed.
    fn sweep(&mut self, now: DateTime<Utc>) {
        if now < self.next_sweep {
            return;
        }

        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live(now));
        self.next_sweep = now
            .checked_add_signed(Duration::seconds(SWEEP_INTERVAL_SECONDS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let swept = before - self.map.len();
        if swept > 0 {
            tracing::debug!("Swept {} expired entries", swept);
        }
    }
}

/// Map-backed store.
///
/// Expired entries are dropped when their key is read, and writes
/// periodically sweep the whole map so keys that are never read again do
/// not accumulate.
pub struct MemoryStore {
    entries: RwLock<Entries>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that evaluates expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                next_sweep: DateTime::<Utc>::MIN_UTC,
            }),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn entry_for(&self, value: String, options: PutOptions) -> Entry {
        // Clamp to the largest span chrono can represent
        let ttl = i64::try_from(options.ttl_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(Duration::seconds(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Entry { value, expires_at }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.map.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.map.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.map.remove(key);
            tracing::debug!("Expired entry evicted: {}", key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> StoreResult<()> {
        let now = self.clock.now();
        let entry = self.entry_for(value, options);

        let mut entries = self.entries.write().await;
        entries.sweep(now);
        entries.map.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.map.remove(key);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        options: PutOptions,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        let entry = self.entry_for(value, options);

        let mut entries = self.entries.write().await;
        entries.sweep(now);
        if entries.map.get(key).is_some_and(|existing| existing.is_live(now)) {
            return Ok(false);
        }
        entries.map.insert(key.to_string(), entry);
        Ok(true)
    }
}
