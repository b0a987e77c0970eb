//! # Reconciler
//!
//! Core reconciliation logic for encrypted SSM parameters.
//!
//! The reconciler:
//! - Writes a parameter from a declared KMS ciphertext (create and update share one path)
//! - Reads the parameter back and reports whether the stored value is still current
//! - Deletes the parameter
//! - Keeps tags in sync with the smallest set of add/remove calls
//!
//! ## Put Flow
//!
//! 1. Decode and decrypt the declared ciphertext
//! 2. Write the plaintext with the declared key, retrying without a tier if the
//!    account does not support the requested one
//! 3. Reconcile tags when they changed
//! 4. Read the parameter back
//!
//! Higher-level flows (`apply`, `refresh`, `import`, `destroy`) live in [`apply`].

pub mod apply;
pub mod delete;
pub mod put;
pub mod read;
pub mod tags;

use crate::config::ReconcilerConfig;
use crate::provider::{Clients, DecryptError, StoreError};
use crate::state::ParameterState;
use crate::tags::IgnoreConfig;
use crate::{DataType, ParameterSpec};
use thiserror::Error;

pub use apply::ApplyOutcome;

/// Failure of a reconciler operation
///
/// Every variant names the parameter. None carries plaintext.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("encrypted_value for SSM Parameter ({name}) is not valid base64: {source}")]
    MalformedCiphertext {
        name: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("error decrypting SSM Parameter ({name}) value with KMS: {source}")]
    Decrypt {
        name: String,
        #[source]
        source: DecryptError,
    },
    #[error("decrypted value for SSM Parameter ({name}) is not valid UTF-8: {source}")]
    InvalidPlaintext {
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("error writing SSM Parameter ({name}): {source}")]
    Write {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("error updating SSM Parameter ({name}) tags: {source}")]
    Tagging {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("error reading SSM Parameter ({name}): {source}")]
    Read {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error(
        "error reading SSM Parameter ({name}) after creation: this can indicate that the provided parameter value could not be validated by SSM"
    )]
    NotFoundAfterCreate { name: String },
    #[error("error describing SSM Parameter ({name}): {source}")]
    Describe {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("error listing tags for SSM Parameter ({name}): {source}")]
    ListTags {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("error deleting SSM Parameter ({name}): {source}")]
    Delete {
        name: String,
        #[source]
        source: StoreError,
    },
    /// The value was written but a later step failed; `state` holds the
    /// identity of the committed parameter
    #[error("SSM Parameter ({id}) was written but not fully reconciled: {source}", id = state.id)]
    Incomplete {
        state: Box<ParameterState>,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    /// Identity of a parameter that exists remotely despite the failure
    ///
    /// Callers persist it so the next run refreshes and updates the
    /// parameter instead of trying to create it again.
    #[must_use]
    pub fn committed_state(&self) -> Option<&ParameterState> {
        match self {
            ReconcileError::Incomplete { state, .. } => Some(state),
            _ => None,
        }
    }
}

/// What a read needs to know besides the identifier
///
/// `is_new_resource` and `data_type` together decide whether a missing
/// parameter is waited for (asynchronous `aws:ec2:image` validation).
#[derive(Clone)]
pub struct ReadContext {
    pub id: String,
    /// Declared ciphertext the stored value is compared against
    pub encrypted_value: String,
    pub encryption_key: String,
    pub data_type: Option<DataType>,
    pub is_new_resource: bool,
    /// Carried into the observed state unchanged
    pub overwrite: Option<bool>,
}

impl std::fmt::Debug for ReadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadContext")
            .field("id", &self.id)
            .field("encryption_key", &self.encryption_key)
            .field("data_type", &self.data_type)
            .field("is_new_resource", &self.is_new_resource)
            .finish_non_exhaustive()
    }
}

impl ReadContext {
    /// Context for reading `id` against a declaration
    #[must_use]
    pub fn for_spec(id: impl Into<String>, spec: &ParameterSpec, is_new_resource: bool) -> Self {
        Self {
            id: id.into(),
            encrypted_value: spec.encrypted_value.clone(),
            encryption_key: spec.encryption_key.clone(),
            data_type: spec.data_type,
            is_new_resource,
            overwrite: spec.overwrite,
        }
    }

    /// Whether a not-found response should be retried until the validation window closes
    #[must_use]
    pub fn awaits_validation(&self) -> bool {
        self.is_new_resource && self.data_type == Some(DataType::Ec2Image)
    }
}

/// Reconciler context
///
/// Holds the remote clients and engine settings; carries no per-parameter state.
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub clients: Clients,
    pub config: ReconcilerConfig,
    /// Presentation filter applied to tags read back from the store
    pub ignore_tags: Option<IgnoreConfig>,
}

impl Reconciler {
    #[must_use]
    pub fn new(clients: Clients, config: ReconcilerConfig, ignore_tags: Option<IgnoreConfig>) -> Self {
        Self {
            clients,
            config,
            ignore_tags,
        }
    }
}

/// Effective overwrite flag: the explicit setting, else "only when updating"
#[must_use]
pub fn should_overwrite(overwrite: Option<bool>, is_new_resource: bool) -> bool {
    overwrite.unwrap_or(!is_new_resource)
}
