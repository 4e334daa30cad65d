//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::{Config, StoreBackend};
use crate::dedup::Metadata;

/// Message deduplication tracker CLI.
#[derive(Parser, Debug)]
#[command(
    name = "msg-dedup",
    version,
    about = "Inspect and manage message deduplication records",
    long_about = "Check, mark, claim and clear message processing records kept in a \
                  TTL-based key-value store.\n\n\
                  Records older than the retry window are reported as not processed so that \
                  failed deliveries can be retried."
)]
pub struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "msg-dedup.toml", global = true)]
    pub config: PathBuf,

    /// Store backend.
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendArg>,

    /// Directory for the file store.
    #[arg(long = "store-dir", env = "MSG_DEDUP_STORE_DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Record lifetime in seconds.
    #[arg(long, env = "MSG_DEDUP_TTL", global = true)]
    pub ttl: Option<u64>,

    /// Key namespace.
    #[arg(long, env = "MSG_DEDUP_PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Age in milliseconds after which a record allows a retry.
    #[arg(long = "retry-window-ms", global = true)]
    pub retry_window_ms: Option<u64>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Tracker operations exposed on the command line.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Report whether message IDs were processed within the retry window.
    Check {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },
    /// Record a message as processed.
    Mark {
        id: String,
        /// Metadata entry as key=value. JSON values are parsed, anything else is a string.
        #[arg(short, long = "meta", value_parser = parse_meta_pair)]
        meta: Vec<(String, Value)>,
    },
    /// Atomically claim a message for processing.
    Claim {
        id: String,
        /// Metadata entry as key=value.
        #[arg(short, long = "meta", value_parser = parse_meta_pair)]
        meta: Vec<(String, Value)>,
    },
    /// Show the stored record for a message.
    Info { id: String },
    /// Delete a record, failing on store errors.
    Remove { id: String },
    /// Delete a record, reporting success as a flag.
    Clear { id: String },
    /// Show tracker configuration.
    Stats,
    /// Delete expired records from the file store.
    Purge,
}

/// CLI store backend argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    /// In-process map; nothing survives the command.
    Memory,
    /// One file per key under the store directory.
    File,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => StoreBackend::Memory,
            BackendArg::File => StoreBackend::File,
        }
    }
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.store.backend = backend.into();
        }

        if let Some(dir) = &self.store_dir {
            config.store.directory = Some(dir.clone());
        }

        if let Some(ttl) = self.ttl {
            config.tracker.expiration_ttl = ttl;
        }

        if let Some(prefix) = &self.prefix {
            config.tracker.key_prefix = prefix.clone();
        }

        if let Some(window) = self.retry_window_ms {
            config.tracker.retry_window_ms = window;
        }
    }
}

/// Parse a `key=value` metadata pair.
pub fn parse_meta_pair(input: &str) -> Result<(String, Value), String> {
    let (key, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("Expected key=value, got '{}'", input))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Metadata key is empty in '{}'", input));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Collect parsed pairs into record metadata. Later keys win.
pub fn into_metadata(pairs: Vec<(String, Value)>) -> Metadata {
    pairs.into_iter().collect()
}
