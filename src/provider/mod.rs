//! # Provider Modules
//!
//! Interfaces the reconciler needs from the remote services, and the AWS
//! implementations of them.
//!
//! - `ParameterStore`: typed key/value store with tiers, metadata and tags
//! - `Decryptor`: turns a ciphertext blob plus key id into plaintext
//!
//! Both are passed into the reconciler as a `Clients` bundle so tests can
//! substitute in-memory fakes.

use crate::tags::KeyValueTags;
use crate::{DataType, ParameterType, Tier};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroizing;

pub mod aws;

/// Failure reported by the Parameter Store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("parameter not found: {name}")]
    NotFound { name: String },
    /// The requested tier cannot be used for this write
    #[error("tier is not supported: {message}")]
    TierNotSupported { message: String },
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_tier_not_supported(&self) -> bool {
        matches!(self, StoreError::TierNotSupported { .. })
    }
}

/// Failure reported by the Decryption service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecryptError {
    /// The blob is corrupt or was not produced by KMS
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    /// The blob was encrypted under a different key than the one named
    #[error("incorrect key: {0}")]
    IncorrectKey(String),
    /// Key missing, disabled, pending deletion, or access denied
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),
    #[error("decrypt returned no plaintext")]
    EmptyPlaintext,
    #[error("decrypt failed: {0}")]
    Service(String),
}

impl DecryptError {
    /// Whether the failure means "this ciphertext does not belong to this key"
    /// rather than an operational problem
    #[must_use]
    pub fn is_undecryptable(&self) -> bool {
        matches!(
            self,
            DecryptError::InvalidCiphertext(_) | DecryptError::IncorrectKey(_)
        )
    }
}

/// Write request for a single parameter
#[derive(Clone, PartialEq, Eq)]
pub struct PutParameterInput {
    pub name: String,
    pub r#type: ParameterType,
    /// `None` lets the store choose its default tier
    pub tier: Option<Tier>,
    pub value: Zeroizing<String>,
    pub overwrite: bool,
    pub allowed_pattern: String,
    pub data_type: Option<DataType>,
    /// Only sent when the description changed, so an unchanged one is never cleared
    pub description: Option<String>,
    pub key_id: String,
}

impl fmt::Debug for PutParameterInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutParameterInput")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("tier", &self.tier)
            .field("value", &"<redacted>")
            .field("overwrite", &self.overwrite)
            .field("allowed_pattern", &self.allowed_pattern)
            .field("data_type", &self.data_type)
            .field("description", &self.description)
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Parameter as returned by a decrypting fetch
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub r#type: String,
    /// Plaintext; only ever compared, never stored or logged
    pub value: Zeroizing<String>,
    pub version: i64,
    pub arn: Option<String>,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("version", &self.version)
            .field("arn", &self.arn)
            .finish_non_exhaustive()
    }
}

/// Fields only available from describe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMetadata {
    pub key_id: Option<String>,
    pub description: Option<String>,
    pub tier: Option<Tier>,
    pub allowed_pattern: Option<String>,
    pub data_type: Option<String>,
}

/// Remote parameter store
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Create or update a parameter; returns the new version
    async fn put_parameter(&self, input: &PutParameterInput) -> Result<i64, StoreError>;

    /// Fetch a parameter, decrypting `SecureString` values when asked
    async fn get_parameter(&self, name: &str, with_decryption: bool)
        -> Result<Parameter, StoreError>;

    /// Describe the parameter whose name equals `name` exactly
    async fn describe_parameter(&self, name: &str)
        -> Result<Option<ParameterMetadata>, StoreError>;

    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError>;

    async fn list_tags(
        &self,
        identifier: &str,
        resource_type: &str,
    ) -> Result<KeyValueTags, StoreError>;

    /// Add tags, overwriting values of existing keys
    async fn add_tags(
        &self,
        identifier: &str,
        resource_type: &str,
        tags: &KeyValueTags,
    ) -> Result<(), StoreError>;

    async fn remove_tags(
        &self,
        identifier: &str,
        resource_type: &str,
        keys: &[String],
    ) -> Result<(), StoreError>;
}

/// Remote decryption service
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(
        &self,
        key_id: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, DecryptError>;
}

/// Client handles the reconciler operates on
#[derive(Clone)]
pub struct Clients {
    pub store: Arc<dyn ParameterStore>,
    pub decryptor: Arc<dyn Decryptor>,
}

impl fmt::Debug for Clients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clients").finish_non_exhaustive()
    }
}

impl Clients {
    #[must_use]
    pub fn new(store: Arc<dyn ParameterStore>, decryptor: Arc<dyn Decryptor>) -> Self {
        Self { store, decryptor }
    }
}
