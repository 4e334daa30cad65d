//! Configuration validation logic.

use crate::config::loader::{Config, TrackerConfig};
use crate::error::{Error, Result};

/// Maximum key prefix length.
const MAX_PREFIX_LENGTH: usize = 128;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_tracker_config(&config.tracker)
}

/// Validate tracker settings.
pub fn validate_tracker_config(tracker: &TrackerConfig) -> Result<()> {
    validate_ttl(tracker.expiration_ttl)?;
    validate_key_prefix(&tracker.key_prefix)?;
    validate_retry_window(tracker.retry_window_ms)?;
    Ok(())
}

/// Validate the record TTL.
pub fn validate_ttl(ttl_seconds: u64) -> Result<()> {
    if ttl_seconds == 0 {
        return Err(Error::ConfigValidation {
            field: "expiration_ttl".to_string(),
            message: "TTL must be at least 1 second".to_string(),
        });
    }
    Ok(())
}

/// Validate the key namespace.
pub fn validate_key_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::ConfigValidation {
            field: "key_prefix".to_string(),
            message: "Key prefix must not be empty".to_string(),
        });
    }

    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(Error::ConfigValidation {
            field: "key_prefix".to_string(),
            message: format!(
                "Key prefix must be at most {} characters (got {})",
                MAX_PREFIX_LENGTH,
                prefix.len()
            ),
        });
    }

    if prefix.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::ConfigValidation {
            field: "key_prefix".to_string(),
            message: format!(
                "Key prefix '{}' contains whitespace or control characters",
                prefix
            ),
        });
    }

    Ok(())
}

/// Validate the retry window.
pub fn validate_retry_window(retry_window_ms: u64) -> Result<()> {
    if retry_window_ms == 0 {
        return Err(Error::ConfigValidation {
            field: "retry_window_ms".to_string(),
            message: "Retry window must be at least 1 millisecond".to_string(),
        });
    }

    if i64::try_from(retry_window_ms).is_err() {
        return Err(Error::ConfigValidation {
            field: "retry_window_ms".to_string(),
            message: format!("Retry window {} is out of range", retry_window_ms),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(validate_ttl(0).is_err());
        assert!(validate_ttl(1).is_ok());
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(validate_key_prefix("").is_err());
        assert!(validate_key_prefix("has space").is_err());
        assert!(validate_key_prefix(&"x".repeat(MAX_PREFIX_LENGTH + 1)).is_err());
        assert!(validate_key_prefix("processed_msg").is_ok());
        assert!(validate_key_prefix("tenant:42").is_ok());
    }

    #[test]
    fn test_retry_window_range() {
        assert!(validate_retry_window(0).is_err());
        assert!(validate_retry_window(u64::MAX).is_err());
        assert!(validate_retry_window(300_000).is_ok());
    }

    #[test]
    fn test_error_names_field() {
        let err = validate_ttl(0).unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigValidation { ref field, .. } if field == "expiration_ttl"
        ));
    }
}
