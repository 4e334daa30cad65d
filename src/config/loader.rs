//! Configuration structures and loading logic.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default record lifetime: 24 hours.
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

/// Default key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "processed_msg";

/// Default retry window: 5 minutes.
pub const DEFAULT_RETRY_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Dedup tracker settings. Immutable once handed to a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Record lifetime in seconds; expiry is enforced by the store.
    #[serde(default = "default_ttl", alias = "expirationTtl")]
    pub expiration_ttl: u64,

    /// Namespace prepended to every key as `prefix:msgId`.
    #[serde(default = "default_key_prefix", alias = "keyPrefix")]
    pub key_prefix: String,

    /// Records older than this are treated as retry-eligible.
    #[serde(default = "default_retry_window", alias = "retryWindowMs")]
    pub retry_window_ms: u64,
}

impl TrackerConfig {
    /// Retry window as a chrono duration.
    pub fn retry_window(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.retry_window_ms).unwrap_or(i64::MAX))
    }

    /// Store key for a message ID.
    pub fn key_for(&self, msg_id: &str) -> String {
        format!("{}:{}", self.key_prefix, msg_id)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            expiration_ttl: DEFAULT_TTL_SECONDS,
            key_prefix: default_key_prefix(),
            retry_window_ms: DEFAULT_RETRY_WINDOW_MS,
        }
    }
}

/// Which backing store the CLI opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map; contents vanish with the process.
    Memory,
    /// One file per key under a directory.
    #[default]
    File,
}

/// Backing store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend. Defaults to the platform data dir.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl StoreConfig {
    /// Get the effective store directory.
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_store_directory)
    }
}

/// Platform data directory for the file store, falling back to `./.msg-dedup`.
pub fn default_store_directory() -> PathBuf {
    ProjectDirs::from("", "", "msg-dedup")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".msg-dedup"))
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_retry_window() -> u64 {
    DEFAULT_RETRY_WINDOW_MS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}
