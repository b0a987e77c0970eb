//! # Reconciler Configuration
//!
//! Engine-level settings loaded from environment variables.

use super::env_var_or_default;
use crate::constants::{
    DEFAULT_CREATION_VALIDATION_TIMEOUT_SECS, DEFAULT_POLL_MAX_MS, DEFAULT_POLL_MIN_MS,
};
use std::time::Duration;

/// Reconciler configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How long a freshly created parameter may stay invisible while SSM validates it
    pub creation_validation_timeout: Duration,
    /// First delay between reads inside the validation window
    pub poll_min: Duration,
    /// Upper bound for the delay between reads inside the validation window
    pub poll_max: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            creation_validation_timeout: Duration::from_secs(
                DEFAULT_CREATION_VALIDATION_TIMEOUT_SECS,
            ),
            poll_min: Duration::from_millis(DEFAULT_POLL_MIN_MS),
            poll_max: Duration::from_millis(DEFAULT_POLL_MAX_MS),
        }
    }
}

impl ReconcilerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            creation_validation_timeout: Duration::from_secs(env_var_or_default(
                "ENCRYPTEDSSM_VALIDATION_TIMEOUT_SECS",
                DEFAULT_CREATION_VALIDATION_TIMEOUT_SECS,
            )),
            poll_min: Duration::from_millis(env_var_or_default(
                "ENCRYPTEDSSM_POLL_MIN_MS",
                DEFAULT_POLL_MIN_MS,
            )),
            poll_max: Duration::from_millis(env_var_or_default(
                "ENCRYPTEDSSM_POLL_MAX_MS",
                DEFAULT_POLL_MAX_MS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validation_window_is_two_minutes() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.creation_validation_timeout, Duration::from_secs(120));
        assert!(config.poll_min <= config.poll_max);
    }
}
