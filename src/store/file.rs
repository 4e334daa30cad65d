//! Directory-backed key-value store.
//!
//! Each key is stored as a small JSON envelope file holding the key, the value
//! and its expiry instant. Expired envelopes are treated as absent; reads
//! evict them, and [`FileStore::purge_expired`] sweeps envelopes whose keys
//! are never read again. Keys are percent-encoded into filenames. Encodings
//! too long for a filename are shortened to a readable prefix plus an MD5
//! digest of the key.
//!
//! Writers are serialized within one process only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::store::{KeyValueStore, PutOptions, StoreError, StoreResult};

/// Extension used for envelope files.
const ENVELOPE_EXTENSION: &str = "json";

/// Longest encoded key used verbatim as a file stem. Leaves room for the
/// extension under the common 255-byte filename limit.
const MAX_ENCODED_LEN: usize = 200;

/// Readable part kept in front of the digest for shortened stems.
const DIGEST_PREFIX_LEN: usize = 64;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    /// Original key; distinguishes keys whose shortened stems collide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    value: String,
    /// Expiry instant in epoch milliseconds.
    expires_at: i64,
}

impl Envelope {
    fn belongs_to(&self, key: &str) -> bool {
        self.key.as_deref().map_or(true, |stored| stored == key)
    }
}

/// Store that keeps one file per key under a directory.
pub struct FileStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    // Serializes writers and evictions within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with_clock(root, Arc::new(SystemClock)).await
    }

    /// Open a store that evaluates expiry against `clock`.
    pub async fn open_with_clock(
        root: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::debug!("File store opened at {}", root.display());

        Ok(Self {
            root,
            clock,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the envelope files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every expired envelope in the store directory.
    ///
    /// Returns the number of envelopes removed. Unreadable or corrupt files
    /// are left in place.
    pub async fn purge_expired(&self) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENVELOPE_EXTENSION) {
                continue;
            }

            match read_envelope(&path).await {
                Ok(Some(envelope)) if !self.is_live(&envelope) => {
                    remove_if_exists(&path).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        tracing::debug!("Purged {} expired entries from {}", removed, self.root.display());
        Ok(removed)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", file_stem(key), ENVELOPE_EXTENSION))
    }

    fn is_live(&self, envelope: &Envelope) -> bool {
        self.clock.now().timestamp_millis() < envelope.expires_at
    }

    fn envelope_for(&self, key: &str, value: String, options: PutOptions) -> Envelope {
        let ttl = i64::try_from(options.ttl_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(Duration::seconds(ttl))
            .map(|t| t.timestamp_millis())
            .unwrap_or(i64::MAX);
        Envelope {
            key: Some(key.to_string()),
            value,
            expires_at,
        }
    }

    /// Read the live envelope for `key`, evicting it if it has expired.
    async fn read_live(&self, key: &str) -> StoreResult<Option<Envelope>> {
        let path = self.path_for(key);
        let Some(envelope) = read_envelope(&path).await? else {
            return Ok(None);
        };

        if !envelope.belongs_to(key) {
            tracing::warn!("Envelope {} holds a different key", path.display());
            return Ok(None);
        }

        if self.is_live(&envelope) {
            return Ok(Some(envelope));
        }

        self.evict_if_expired(key, &path).await?;
        Ok(None)
    }

    /// Remove the envelope at `path` if it is still expired.
    ///
    /// A writer may have replaced the file since the caller read it, so the
    /// envelope is re-read under the write lock before removal.
    async fn evict_if_expired(&self, key: &str, path: &Path) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(envelope) = read_envelope(path).await? {
            if !self.is_live(&envelope) {
                remove_if_exists(path).await?;
                tracing::debug!("Expired entry evicted: {}", key);
            }
        }
        Ok(())
    }

    async fn write_envelope(&self, key: &str, envelope: &Envelope) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");
        let content = serde_json::to_vec(envelope)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", key, e)))?;

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read_live(key).await?.map(|envelope| envelope.value))
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> StoreResult<()> {
        let envelope = self.envelope_for(key, value, options);
        let _guard = self.write_lock.lock().await;
        self.write_envelope(key, &envelope).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.path_for(key)).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        options: PutOptions,
    ) -> StoreResult<bool> {
        let envelope = self.envelope_for(key, value, options);
        let _guard = self.write_lock.lock().await;

        let existing = read_envelope(&self.path_for(key)).await?;
        if existing.is_some_and(|e| e.belongs_to(key) && self.is_live(&e)) {
            return Ok(false);
        }
        self.write_envelope(key, &envelope).await?;
        Ok(true)
    }
}

async fn read_envelope(path: &Path) -> StoreResult<Option<Envelope>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io(e)),
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        StoreError::Serialization(format!("Corrupt envelope {}: {}", path.display(), e))
    })
}

async fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// File stem for a key.
///
/// Short keys use their full encoding. Longer ones keep the first
/// [`DIGEST_PREFIX_LEN`] encoded characters followed by `~` and the MD5 of
/// the key. `~` never appears in an encoding, so the two forms cannot clash.
fn file_stem(key: &str) -> String {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_ENCODED_LEN {
        return encoded;
    }

    let digest = Md5::digest(key.as_bytes());
    format!("{}~{:x}", &encoded[..DIGEST_PREFIX_LEN], digest)
}

/// Encode a key into a filename-safe string.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`. The mapping is injective, so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::TrackerConfig;
    use crate::dedup::{DedupTracker, Metadata, NoopObserver};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("processed_msg:abc-1"), "processed_msg%3Aabc-1");
        assert_eq!(encode_key("../etc"), "%2E%2E%2Fetc");
        assert_eq!(encode_key("a%3A"), "a%253A");
        assert_ne!(encode_key("a:b"), encode_key("a%3Ab"));
    }

    #[test]
    fn test_file_stem_is_bounded() {
        assert_eq!(file_stem("ns:short"), "ns%3Ashort");

        let long_plain = "a".repeat(300);
        let long_symbols = "/".repeat(100);
        for key in [&long_plain, &long_symbols] {
            let stem = file_stem(key);
            assert!(stem.len() + ENVELOPE_EXTENSION.len() + 1 < 255);
            assert!(stem.contains('~'));
        }

        // Same prefix, different tails
        let a = format!("{}a", "x".repeat(250));
        let b = format!("{}b", "x".repeat(250));
        assert_ne!(file_stem(&a), file_stem(&b));
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let options = PutOptions { ttl_seconds: 60 };

        store.put("ns:a", "one".into(), options).await.unwrap();
        assert_eq!(store.get_raw("ns:a").await.unwrap(), Some("one".into()));
        assert!(dir.path().join("ns%3Aa.json").exists());

        store.delete("ns:a").await.unwrap();
        assert_eq!(store.get_raw("ns:a").await.unwrap(), None);
        store.delete("ns:a").await.unwrap();
    }

    #[tokio::test]
    async fn test_long_ids_are_tracked() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let tracker = DedupTracker::new(store.clone(), TrackerConfig::default())
            .with_observer(Arc::new(NoopObserver));

        let long_id = format!("chat:{}", "9".repeat(297));
        let long_symbolic_id = "ü/".repeat(60);

        for id in [&long_id, &long_symbolic_id] {
            assert!(tracker.mark_processed(id, Metadata::new()).await);
            assert!(tracker.is_processed(id).await);
            assert_eq!(tracker.get_process_info(id).await.unwrap().msg_id, *id);
            assert!(tracker.clear(id).await);
            assert!(!tracker.is_processed(id).await);
        }
    }

    #[tokio::test]
    async fn test_foreign_envelope_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let options = PutOptions { ttl_seconds: 60 };

        store.put("k", "mine".into(), options).await.unwrap();
        std::fs::write(
            dir.path().join("k.json"),
            r#"{"key":"other","value":"theirs","expiresAt":9223372036854775807}"#,
        )
        .unwrap();

        assert_eq!(store.get_raw("k").await.unwrap(), None);
        assert!(store.put_if_absent("k", "mine".into(), options).await.unwrap());
        assert_eq!(store.get_raw("k").await.unwrap(), Some("mine".into()));
    }

    #[tokio::test]
    async fn test_entries_expire_and_are_removed() {
        let dir = TempDir::new().unwrap();
        let clock = test_clock();
        let store = FileStore::open_with_clock(dir.path(), clock.clone())
            .await
            .unwrap();

        store
            .put("k", "v".into(), PutOptions { ttl_seconds: 5 })
            .await
            .unwrap();
        clock.advance(Duration::seconds(5));

        assert_eq!(store.get_raw("k").await.unwrap(), None);
        assert!(!dir.path().join("k.json").exists());
    }

    #[tokio::test]
    async fn test_eviction_keeps_rewritten_entry() {
        let dir = TempDir::new().unwrap();
        let clock = test_clock();
        let store = FileStore::open_with_clock(dir.path(), clock.clone())
            .await
            .unwrap();
        let path = store.path_for("k");

        store
            .put("k", "old".into(), PutOptions { ttl_seconds: 5 })
            .await
            .unwrap();
        clock.advance(Duration::seconds(10));

        // A reader saw the expired envelope; a writer replaces it before the
        // reader gets to evict.
        store
            .put("k", "fresh".into(), PutOptions { ttl_seconds: 60 })
            .await
            .unwrap();
        store.evict_if_expired("k", &path).await.unwrap();

        assert!(path.exists());
        assert_eq!(store.get_raw("k").await.unwrap(), Some("fresh".into()));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let dir = TempDir::new().unwrap();
        let clock = test_clock();
        let store = FileStore::open_with_clock(dir.path(), clock.clone())
            .await
            .unwrap();

        for i in 0..20 {
            store
                .put(&format!("old:{}", i), "v".into(), PutOptions { ttl_seconds: 1 })
                .await
                .unwrap();
        }
        clock.advance(Duration::days(30));
        store
            .put("new", "v".into(), PutOptions { ttl_seconds: 60 })
            .await
            .unwrap();
        std::fs::write(dir.path().join("broken.json"), "garbage").unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 20);
        assert_eq!(store.get_raw("new").await.unwrap(), Some("v".into()));
        assert!(dir.path().join("broken.json").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let options = PutOptions { ttl_seconds: 60 };

        assert!(store.put_if_absent("k", "1".into(), options).await.unwrap());
        assert!(!store.put_if_absent("k", "2".into(), options).await.unwrap());
        assert_eq!(store.get_raw("k").await.unwrap(), Some("1".into()));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store
                .put("k", "persisted".into(), PutOptions { ttl_seconds: 60 })
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get_raw("k").await.unwrap(), Some("persisted".into()));
    }

    #[tokio::test]
    async fn test_corrupt_envelope_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("k.json"), "garbage").unwrap();

        let result = store.get_raw("k").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
