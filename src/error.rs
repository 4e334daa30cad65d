//! Error types for the msg-dedup crate.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // Caller input errors
    #[error("Message ID must not be empty")]
    EmptyMessageId,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes used by the CLI.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const NOT_PROCESSED: i32 = 1;
    pub const STORE_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const INPUT_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
}
