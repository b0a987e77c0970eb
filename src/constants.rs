//! # Constants
//!
//! Shared constants used throughout the reconciler.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Maximum amount of time to wait for asynchronous validation after a
/// parameter is created (seconds)
pub const DEFAULT_CREATION_VALIDATION_TIMEOUT_SECS: u64 = 120;

/// Initial delay between reads while waiting for creation validation (milliseconds)
pub const DEFAULT_POLL_MIN_MS: u64 = 500;

/// Maximum delay between reads while waiting for creation validation (milliseconds)
pub const DEFAULT_POLL_MAX_MS: u64 = 10_000;

/// Default number of attempts the AWS SDK makes for a single API request
pub const DEFAULT_MAX_RETRIES: u32 = 25;

/// Tag keys with this prefix are owned by AWS and cannot be managed by users
pub const AWS_TAG_KEY_PREFIX: &str = "aws:";

/// Resource type used by the SSM tagging APIs for parameters
pub const PARAMETER_RESOURCE_TYPE: &str = "Parameter";

/// Observed value shown when the stored secret no longer matches the declared ciphertext
pub const OUTDATED_VALUE_SENTINEL: &str = "Outdated sensitive value";

/// Data type whose values SSM validates asynchronously after creation
pub const EC2_IMAGE_DATA_TYPE: &str = "aws:ec2:image";

/// Default data type SSM assigns to parameters
pub const TEXT_DATA_TYPE: &str = "text";

/// Schema version written to state files
pub const STATE_FORMAT_VERSION: u32 = 1;
