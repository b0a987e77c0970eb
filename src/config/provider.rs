//! # Provider Configuration
//!
//! AWS session settings. Values come from the document's `provider` block
//! first; anything left unset falls back to the standard AWS environment
//! variables and then to the SDK's default credential chain.

use super::{env_var_or_default, env_var_or_default_bool, first_env_var};
use crate::constants::DEFAULT_MAX_RETRIES;
use crate::tags::{IgnoreConfig, IgnoreTagsSettings};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static REGION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso|-isob|-isof|-isoe)?-[a-z]+-\d+$")
        .expect("Failed to compile REGION_PATTERN - this should never happen")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no region configured: set provider.region, AWS_REGION or AWS_DEFAULT_REGION")]
    MissingRegion,
    #[error("invalid AWS region: {0}")]
    InvalidRegion(String),
    #[error("allowed_account_ids and forbidden_account_ids cannot both be set")]
    ConflictingAccountLists,
    #[error("access_key and secret_key must be set together")]
    IncompleteStaticCredentials,
    #[error("AWS account ID not allowed: {0}")]
    AccountNotAllowed(String),
    #[error("AWS account ID not allowed: {0} (forbidden)")]
    AccountForbidden(String),
}

/// Provider block of the declarative document
#[derive(Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    /// The region where AWS operations will take place, e.g. us-east-1
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile; the default profile is used when unset
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Session token, only needed for temporary credentials
    #[serde(default)]
    pub token: Option<String>,
    /// Path to the shared credentials file (defaults to ~/.aws/credentials)
    #[serde(default)]
    pub shared_credentials_file: Option<String>,
    /// Maximum attempts for a single AWS API request
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub assume_role: Option<AssumeRoleConfig>,
    #[serde(default)]
    pub allowed_account_ids: Vec<String>,
    #[serde(default)]
    pub forbidden_account_ids: Vec<String>,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub skip_region_validation: bool,
    #[serde(default)]
    pub skip_credentials_validation: bool,
    /// Tags hidden from observed state; never affects what is written
    #[serde(default)]
    pub ignore_tags: IgnoreTagsSettings,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("access_key", &self.access_key)
            .field("shared_credentials_file", &self.shared_credentials_file)
            .field("max_retries", &self.max_retries)
            .field("assume_role", &self.assume_role)
            .field("allowed_account_ids", &self.allowed_account_ids)
            .field("forbidden_account_ids", &self.forbidden_account_ids)
            .field("endpoints", &self.endpoints)
            .field("skip_region_validation", &self.skip_region_validation)
            .field("skip_credentials_validation", &self.skip_credentials_validation)
            .field("ignore_tags", &self.ignore_tags)
            .finish_non_exhaustive()
    }
}

/// Role assumed before any API call is made
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct AssumeRoleConfig {
    pub role_arn: String,
    #[serde(default)]
    pub session_name: Option<String>,
    /// Unique identifier that might be required for assuming a role in another account
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i32>,
    /// IAM policy JSON further restricting the assumed role's permissions
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub policy_arns: Vec<String>,
    /// Session tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub transitive_tag_keys: Vec<String>,
}

/// Service endpoint overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct EndpointsConfig {
    #[serde(default)]
    pub ssm: Option<String>,
    #[serde(default)]
    pub kms: Option<String>,
    #[serde(default)]
    pub sts: Option<String>,
}

impl ProviderConfig {
    /// Fill unset fields from the environment
    #[must_use]
    pub fn with_env_defaults(mut self) -> Self {
        if self.region.is_none() {
            self.region = first_env_var(&["AWS_REGION", "AWS_DEFAULT_REGION"]);
        }
        if self.profile.is_none() {
            self.profile = first_env_var(&["AWS_PROFILE"]);
        }
        if self.shared_credentials_file.is_none() {
            self.shared_credentials_file = first_env_var(&["AWS_SHARED_CREDENTIALS_FILE"]);
        }
        if self.max_retries.is_none() {
            self.max_retries = Some(env_var_or_default("AWS_MAX_ATTEMPTS", DEFAULT_MAX_RETRIES));
        }
        if self.endpoints.ssm.is_none() {
            self.endpoints.ssm = first_env_var(&["AWS_ENDPOINT_URL_SSM"]);
        }
        if self.endpoints.kms.is_none() {
            self.endpoints.kms = first_env_var(&["AWS_ENDPOINT_URL_KMS"]);
        }
        if self.endpoints.sts.is_none() {
            self.endpoints.sts = first_env_var(&["AWS_ENDPOINT_URL_STS"]);
        }
        self.skip_region_validation |=
            env_var_or_default_bool("ENCRYPTEDSSM_SKIP_REGION_VALIDATION", false);
        self.skip_credentials_validation |=
            env_var_or_default_bool("ENCRYPTEDSSM_SKIP_CREDENTIALS_VALIDATION", false);
        self
    }

    /// Check the settings that can be verified without calling AWS
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed region, conflicting
    /// account lists, or half-specified static credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = self.region.as_deref().ok_or(ConfigError::MissingRegion)?;
        if !self.skip_region_validation {
            validate_region(region)?;
        }
        if !self.allowed_account_ids.is_empty() && !self.forbidden_account_ids.is_empty() {
            return Err(ConfigError::ConflictingAccountLists);
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(ConfigError::IncompleteStaticCredentials);
        }
        Ok(())
    }

    /// Check the caller's account against the allow/forbid lists
    ///
    /// # Errors
    ///
    /// Returns an error if the account is not in `allowed_account_ids`
    /// or is listed in `forbidden_account_ids`.
    pub fn check_account(&self, account_id: &str) -> Result<(), ConfigError> {
        if !self.allowed_account_ids.is_empty()
            && !self.allowed_account_ids.iter().any(|a| a == account_id)
        {
            return Err(ConfigError::AccountNotAllowed(account_id.to_string()));
        }
        if self.forbidden_account_ids.iter().any(|a| a == account_id) {
            return Err(ConfigError::AccountForbidden(account_id.to_string()));
        }
        Ok(())
    }

    /// Whether the caller identity has to be looked up at all
    #[must_use]
    pub fn needs_account_check(&self) -> bool {
        !self.skip_credentials_validation
            || !self.allowed_account_ids.is_empty()
            || !self.forbidden_account_ids.is_empty()
    }

    #[must_use]
    pub fn ignore_config(&self) -> Option<IgnoreConfig> {
        let config = IgnoreConfig::from(&self.ignore_tags);
        (!config.is_empty()).then_some(config)
    }
}

/// Validate the shape of an AWS region name
///
/// # Errors
///
/// Returns `ConfigError::InvalidRegion` when the name does not look like a region.
pub fn validate_region(region: &str) -> Result<(), ConfigError> {
    if REGION_PATTERN.is_match(region) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRegion(region.to_string()))
    }
}
