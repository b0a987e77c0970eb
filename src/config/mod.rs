//! # Configuration
//!
//! - `provider`: AWS session settings from the document's `provider` block and the environment
//! - `reconciler`: engine tuning (creation validation window, polling backoff)

pub mod provider;
pub mod reconciler;

pub use provider::{AssumeRoleConfig, ConfigError, EndpointsConfig, ProviderConfig};
pub use reconciler::ReconcilerConfig;

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// First non-empty value among the given environment variables
fn first_env_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.trim().is_empty())
}
