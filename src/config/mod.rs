//! Configuration module for msg-dedup.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Tracker and store settings with defaults
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{
    default_store_directory, Config, StoreBackend, StoreConfig, TrackerConfig,
    DEFAULT_KEY_PREFIX, DEFAULT_RETRY_WINDOW_MS, DEFAULT_TTL_SECONDS,
};
pub use validation::{validate_config, validate_tracker_config};
