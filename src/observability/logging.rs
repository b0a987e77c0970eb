//! # Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the
//! level passed on the command line.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor a CLI level is given
pub const DEFAULT_LOG_FILTER: &str = "encrypted_ssm=info,encryptedssm=info";

/// Build the filter used by `init_logging`
#[must_use]
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => EnvFilter::new(format!(
            "encrypted_ssm={level},encryptedssm={level}"
        )),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    })
}

/// Initialize the global subscriber, writing to stderr so stdout stays
/// reserved for command output
pub fn init_logging(level: Option<&str>, ansi: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .init();
}
