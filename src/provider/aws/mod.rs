//! # AWS Session Bootstrap
//!
//! Builds the SSM and KMS client handles the reconciler depends on.
//!
//! This module provides functionality to:
//! - Load the shared SDK config (region, profile, static keys, retry budget)
//! - Assume a role through STS before any Parameter Store call is made
//! - Validate the caller's account against the allow/forbid lists

use crate::config::{AssumeRoleConfig, ProviderConfig};
use crate::provider::Clients;
use anyhow::{anyhow, Context, Result};
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_sts::types::{PolicyDescriptorType, Tag as StsTag};
use aws_sdk_sts::Client as StsClient;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

pub mod kms;
pub mod parameter_store;

pub use kms::KmsDecryptor;
pub use parameter_store::SsmParameterStore;

const DEFAULT_SESSION_NAME: &str = "encryptedssm";

/// Build the client bundle for the configured account and region
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the role cannot be
/// assumed, or the caller's account is not allowed.
pub async fn connect(config: &ProviderConfig) -> Result<Clients> {
    config.validate()?;
    let sdk_config = load_sdk_config(config).await?;

    let sdk_config = match &config.assume_role {
        Some(role) => assume_role(&sdk_config, role, config.endpoints.sts.as_deref()).await?,
        None => sdk_config,
    };

    if config.needs_account_check() {
        validate_account(&sdk_config, config).await?;
    }

    let store = SsmParameterStore::new(&sdk_config, config.endpoints.ssm.as_deref());
    let decryptor = KmsDecryptor::new(&sdk_config, config.endpoints.kms.as_deref());

    Ok(Clients::new(Arc::new(store), Arc::new(decryptor)))
}

/// Create AWS SDK config from the provider settings, falling back to the
/// default credential chain
#[allow(deprecated, reason = "ProfileFiles is still the ConfigLoader input type")]
async fn load_sdk_config(config: &ProviderConfig) -> Result<SdkConfig> {
    let region = config
        .region
        .clone()
        .ok_or_else(|| anyhow!("region is required"))?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.clone()))
        .retry_config(
            RetryConfig::standard()
                .with_max_attempts(config.max_retries.unwrap_or(crate::constants::DEFAULT_MAX_RETRIES)),
        );

    if let Some(profile) = &config.profile {
        info!("Using AWS profile: {}", profile);
        loader = loader.profile_name(profile);
    }

    if let Some(path) = &config.shared_credentials_file {
        use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
        debug!("Using shared credentials file: {}", path);
        let files = ProfileFiles::builder()
            .include_default_config_file(true)
            .with_file(ProfileFileKind::Credentials, path)
            .build();
        loader = loader.profile_files(files);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        info!("Using static access key credentials");
        loader = loader.credentials_provider(Credentials::new(
            access_key,
            secret_key,
            config.token.clone(),
            None,
            "encryptedssm-static",
        ));
    }

    info!("AWS region: {}", region);
    Ok(loader.load().await)
}

fn sts_client(sdk_config: &SdkConfig, endpoint: Option<&str>) -> StsClient {
    let mut builder = aws_sdk_sts::config::Builder::from(sdk_config);
    if let Some(endpoint) = endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    StsClient::from_conf(builder.build())
}

/// Exchange the base credentials for the assumed role's session credentials
async fn assume_role(
    sdk_config: &SdkConfig,
    role: &AssumeRoleConfig,
    sts_endpoint: Option<&str>,
) -> Result<SdkConfig> {
    let session_name = role
        .session_name
        .clone()
        .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
    info!(
        "assume_role configuration set: (ARN: {:?}, SessionID: {:?}, ExternalID: {:?})",
        role.role_arn, session_name, role.external_id
    );

    let tags = role
        .tags
        .iter()
        .map(|(key, value)| StsTag::builder().key(key).value(value).build())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid assume_role session tag")?;
    let policy_arns = role
        .policy_arns
        .iter()
        .map(|arn| PolicyDescriptorType::builder().arn(arn).build())
        .collect::<Vec<_>>();

    let output = sts_client(sdk_config, sts_endpoint)
        .assume_role()
        .role_arn(&role.role_arn)
        .role_session_name(&session_name)
        .set_external_id(role.external_id.clone())
        .set_duration_seconds(role.duration_seconds)
        .set_policy(role.policy.clone())
        .set_policy_arns((!policy_arns.is_empty()).then_some(policy_arns))
        .set_tags((!tags.is_empty()).then_some(tags))
        .set_transitive_tag_keys(
            (!role.transitive_tag_keys.is_empty()).then(|| role.transitive_tag_keys.clone()),
        )
        .send()
        .await
        .with_context(|| format!("Failed to assume role {}", role.role_arn))?;

    let credentials = output
        .credentials()
        .ok_or_else(|| anyhow!("AssumeRole for {} returned no credentials", role.role_arn))?;

    let session = Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        Some(credentials.session_token().to_string()),
        SystemTime::try_from(*credentials.expiration()).ok(),
        "encryptedssm-assume-role",
    );

    Ok(sdk_config
        .clone()
        .into_builder()
        .credentials_provider(SharedCredentialsProvider::new(session))
        .build())
}

/// Look up the caller's account and check it against the configured lists
async fn validate_account(sdk_config: &SdkConfig, config: &ProviderConfig) -> Result<()> {
    let identity = sts_client(sdk_config, config.endpoints.sts.as_deref())
        .get_caller_identity()
        .send()
        .await
        .context("Failed to validate credentials with STS GetCallerIdentity")?;

    let account_id = identity
        .account()
        .ok_or_else(|| anyhow!("GetCallerIdentity returned no account ID"))?;
    debug!("Authenticated as account {}", account_id);
    config.check_account(account_id)?;
    Ok(())
}
