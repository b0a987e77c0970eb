//! # State File
//!
//! Observed state of the managed parameter, persisted between invocations.
//!
//! The state file is the durable identity marker: a parameter is "managed"
//! once a state file with `parameter` set exists. Writes go to a temporary
//! file in the same directory and are renamed into place.

use crate::constants::STATE_FORMAT_VERSION;
use crate::{DataType, ParameterType, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("state file {path} has unsupported version {found} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Observed fields of a managed parameter
///
/// `encrypted_value` is either the declared ciphertext or the stale-value
/// sentinel; plaintext is never stored.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ParameterState {
    /// Identity of the remote object; equal to `name`
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tier: Tier,
    #[serde(rename = "type")]
    pub r#type: ParameterType,
    pub encrypted_value: String,
    pub encryption_key: String,
    /// Key id reported by describe; may differ in form from `encryption_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    pub version: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl fmt::Debug for ParameterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterState")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("encryption_key", &self.encryption_key)
            .field("key_id", &self.key_id)
            .field("arn", &self.arn)
            .field("data_type", &self.data_type)
            .field("version", &self.version)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub parameter: Option<ParameterState>,
    pub updated_at: DateTime<Utc>,
}

impl StateFile {
    #[must_use]
    pub fn new(parameter: Option<ParameterState>) -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            parameter,
            updated_at: Utc::now(),
        }
    }

    /// Load the state file; a missing file means nothing is managed yet
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or has
    /// an unknown format version.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                return Ok(Self::new(None));
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let state: Self = serde_json::from_str(&contents).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if state.version != STATE_FORMAT_VERSION {
            return Err(StateError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: state.version,
                expected: STATE_FORMAT_VERSION,
            });
        }
        Ok(state)
    }

    /// Atomically replace the state file
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let write_err = |source: std::io::Error| StateError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&body).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        debug!("Wrote state file {}", path.display());
        Ok(())
    }
}
