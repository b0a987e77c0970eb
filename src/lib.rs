//! Encrypted SSM Parameter Library
//!
//! This library reconciles `SecureString` parameters in AWS Systems Manager
//! Parameter Store from declarations that only ever carry a KMS ciphertext.
//! Tests are included in the module files and under `tests/`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod provider;
pub mod state;
pub mod tags;

pub use config::ProviderConfig;

/// Declarative document read from disk
///
/// # Example
///
/// ```yaml
/// provider:
///   region: eu-west-1
///   ignore_tags:
///     key_prefixes: ["kubernetes.io/"]
/// parameter:
///   name: /my-service/prod/db_password
///   type: SecureString
///   tier: Standard
///   encrypted_value: AQICAHh...
///   encryption_key: alias/my-service
///   tags:
///     team: payments
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct ParameterDocument {
    /// Provider and session settings; environment variables fill the gaps
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    /// The parameter to manage
    pub parameter: ParameterSpec,
}

/// Desired state of one encrypted parameter
#[derive(Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ParameterSpec {
    /// Parameter name; changing it replaces the parameter
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(rename = "type")]
    pub r#type: ParameterType,
    /// Base64 KMS ciphertext of the secret value
    pub encrypted_value: String,
    /// KMS key id, ARN or alias that produced `encrypted_value`
    pub encryption_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// Unset means: do not overwrite on create, overwrite on update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("type", &self.r#type)
            .field("encryption_key", &self.encryption_key)
            .field("data_type", &self.data_type)
            .field("overwrite", &self.overwrite)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Parameter Store tier
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Tier {
    #[default]
    Standard,
    Advanced,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "Standard",
            Tier::Advanced => "Advanced",
        }
    }

    /// Parse the tier string returned by Parameter Store.
    /// `Intelligent-Tiering` is a write-only policy and never comes back from describe.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Standard" => Some(Tier::Standard),
            "Advanced" => Some(Tier::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only encrypted parameters are managed
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ParameterType {
    #[default]
    SecureString,
}

impl ParameterType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::SecureString => "SecureString",
        }
    }
}

/// Value classification applied by Parameter Store
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum DataType {
    #[serde(rename = "text")]
    Text,
    /// Validated asynchronously by SSM after the parameter is created
    #[serde(rename = "aws:ec2:image")]
    Ec2Image,
}

impl DataType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => constants::TEXT_DATA_TYPE,
            DataType::Ec2Image => constants::EC2_IMAGE_DATA_TYPE,
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            constants::TEXT_DATA_TYPE => Some(DataType::Text),
            constants::EC2_IMAGE_DATA_TYPE => Some(DataType::Ec2Image),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
