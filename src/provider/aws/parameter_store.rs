//! # AWS Parameter Store Client
//!
//! `ParameterStore` implementation backed by the AWS Systems Manager API.
//!
//! Service errors are classified into `StoreError` so the reconciler can
//! react to `ParameterNotFound` and to the "Tier is not supported"
//! validation failure without parsing strings itself.

use crate::observability::metrics;
use crate::provider::{Parameter, ParameterMetadata, ParameterStore, PutParameterInput, StoreError};
use crate::tags::KeyValueTags;
use crate::Tier;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::types::{
    ParameterStringFilter, ParameterTier, ParameterType as SsmParameterType,
    ResourceTypeForTagging, Tag,
};
use aws_sdk_ssm::Client as SsmClient;
use std::time::Instant;
use tracing::debug;
use zeroize::Zeroizing;

const SERVICE: &str = "ssm";

/// Error code returned for missing parameters
const PARAMETER_NOT_FOUND: &str = "ParameterNotFound";
const VALIDATION_EXCEPTION: &str = "ValidationException";
const TIER_NOT_SUPPORTED_MESSAGE: &str = "Tier is not supported";

/// AWS Parameter Store provider implementation
#[derive(Clone)]
pub struct SsmParameterStore {
    client: SsmClient,
    region: Option<String>,
}

impl std::fmt::Debug for SsmParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsmParameterStore")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl SsmParameterStore {
    /// Create a client from a loaded SDK config, optionally pointing at a
    /// custom endpoint
    #[must_use]
    pub fn new(sdk_config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_ssm::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: SsmClient::from_conf(builder.build()),
            region: sdk_config.region().map(ToString::to_string),
        }
    }
}

/// Sort an SSM error code and message into the store's error taxonomy
///
/// `detail` is the full error context, kept for unclassified failures.
fn classify_code(
    operation: &'static str,
    name: &str,
    code: Option<&str>,
    message: &str,
    detail: String,
) -> StoreError {
    match code {
        Some(PARAMETER_NOT_FOUND) => StoreError::NotFound {
            name: name.to_string(),
        },
        Some(VALIDATION_EXCEPTION) if message.contains(TIER_NOT_SUPPORTED_MESSAGE) => {
            StoreError::TierNotSupported {
                message: message.to_string(),
            }
        }
        _ => StoreError::Service {
            operation,
            code: code.map(ToString::to_string),
            message: detail,
        },
    }
}

/// Not-found is an expected answer for an absent or still-validating
/// parameter and is not counted as a remote error
fn counts_as_remote_error(error: &StoreError) -> bool {
    !error.is_not_found()
}

/// Map an SDK failure onto the store's error taxonomy
fn classify<E>(operation: &'static str, name: &str, err: &SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let error = classify_code(
        operation,
        name,
        err.code(),
        err.message().unwrap_or_default(),
        DisplayErrorContext(err).to_string(),
    );
    if counts_as_remote_error(&error) {
        metrics::increment_remote_call_errors(SERVICE);
    }
    error
}

fn record(call: &str, start: Instant) {
    metrics::record_remote_call(SERVICE, call, start.elapsed().as_secs_f64());
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn put_parameter(&self, input: &PutParameterInput) -> Result<i64, StoreError> {
        let start = Instant::now();
        debug!(parameter = %input.name, tier = ?input.tier, overwrite = input.overwrite, "PutParameter");

        let result = self
            .client
            .put_parameter()
            .name(&input.name)
            .r#type(SsmParameterType::from(input.r#type.as_str()))
            .set_tier(input.tier.map(|t| ParameterTier::from(t.as_str())))
            .value(input.value.as_str())
            .overwrite(input.overwrite)
            .allowed_pattern(&input.allowed_pattern)
            .set_data_type(input.data_type.map(|d| d.as_str().to_string()))
            .set_description(input.description.clone())
            .key_id(&input.key_id)
            .send()
            .await;
        record("put_parameter", start);

        result
            .map(|output| output.version())
            .map_err(|e| classify("PutParameter", &input.name, &e))
    }

    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<Parameter, StoreError> {
        let start = Instant::now();
        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await;
        record("get_parameter", start);

        let output = result.map_err(|e| classify("GetParameter", name, &e))?;
        let parameter = output.parameter().ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })?;

        Ok(Parameter {
            name: parameter.name().unwrap_or(name).to_string(),
            r#type: parameter
                .r#type()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            value: Zeroizing::new(parameter.value().unwrap_or_default().to_string()),
            version: parameter.version(),
            arn: parameter.arn().map(ToString::to_string),
        })
    }

    async fn describe_parameter(
        &self,
        name: &str,
    ) -> Result<Option<ParameterMetadata>, StoreError> {
        let filter = ParameterStringFilter::builder()
            .key("Name")
            .option("Equals")
            .values(name)
            .build()
            .map_err(|e| StoreError::Service {
                operation: "DescribeParameters",
                code: None,
                message: e.to_string(),
            })?;

        let start = Instant::now();
        let result = self
            .client
            .describe_parameters()
            .parameter_filters(filter)
            .send()
            .await;
        record("describe_parameters", start);

        let output = result.map_err(|e| classify("DescribeParameters", name, &e))?;
        Ok(output.parameters().first().map(|detail| ParameterMetadata {
            key_id: detail.key_id().map(ToString::to_string),
            description: detail.description().map(ToString::to_string),
            tier: detail.tier().and_then(|t| Tier::parse(t.as_str())),
            allowed_pattern: detail.allowed_pattern().map(ToString::to_string),
            data_type: detail.data_type().map(ToString::to_string),
        }))
    }

    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.client.delete_parameter().name(name).send().await;
        record("delete_parameter", start);

        result
            .map(|_| ())
            .map_err(|e| classify("DeleteParameter", name, &e))
    }

    async fn list_tags(
        &self,
        identifier: &str,
        resource_type: &str,
    ) -> Result<KeyValueTags, StoreError> {
        let start = Instant::now();
        let result = self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::from(resource_type))
            .resource_id(identifier)
            .send()
            .await;
        record("list_tags_for_resource", start);

        let output = result.map_err(|e| classify("ListTagsForResource", identifier, &e))?;
        Ok(KeyValueTags::from_string_map(
            output
                .tag_list()
                .iter()
                .map(|tag| (tag.key().to_string(), tag.value().to_string())),
        ))
    }

    async fn add_tags(
        &self,
        identifier: &str,
        resource_type: &str,
        tags: &KeyValueTags,
    ) -> Result<(), StoreError> {
        let ssm_tags = tags
            .map()
            .into_iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Service {
                operation: "AddTagsToResource",
                code: None,
                message: e.to_string(),
            })?;

        let start = Instant::now();
        let result = self
            .client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::from(resource_type))
            .resource_id(identifier)
            .set_tags(Some(ssm_tags))
            .send()
            .await;
        record("add_tags_to_resource", start);

        result
            .map(|_| ())
            .map_err(|e| classify("AddTagsToResource", identifier, &e))
    }

    async fn remove_tags(
        &self,
        identifier: &str,
        resource_type: &str,
        keys: &[String],
    ) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self
            .client
            .remove_tags_from_resource()
            .resource_type(ResourceTypeForTagging::from(resource_type))
            .resource_id(identifier)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await;
        record("remove_tags_from_resource", start);

        result
            .map(|_| ())
            .map_err(|e| classify("RemoveTagsFromResource", identifier, &e))
    }
}
