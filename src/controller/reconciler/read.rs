//! # Read
//!
//! Observes a parameter: fetches and decrypts the stored value, compares it
//! with the declared ciphertext, then fills in metadata and tags.
//!
//! A parameter created with data type `aws:ec2:image` is validated by SSM
//! asynchronously and stays invisible until validation passes, so a new
//! parameter of that type is polled for up to the configured window.

use super::{ReadContext, ReconcileError, Reconciler};
use crate::constants::PARAMETER_RESOURCE_TYPE;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::comparator::{compare, decode_ciphertext};
use crate::controller::retry::{retry_until_deadline, RetryError};
use crate::observability::metrics;
use crate::provider::{Parameter, StoreError};
use crate::state::ParameterState;
use crate::{DataType, ParameterType, Tier};
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

impl Reconciler {
    /// Read the parameter named by `ctx.id`
    ///
    /// Returns `Ok(None)` when an existing parameter has disappeared; the
    /// caller should drop it from state.
    ///
    /// # Errors
    ///
    /// Returns an error when a new parameter cannot be found, or when any
    /// get, decrypt, describe or tag call fails.
    pub async fn read(&self, ctx: &ReadContext) -> Result<Option<ParameterState>, ReconcileError> {
        let span = info_span!(
            "ssm.parameter.read",
            parameter.name = %ctx.id,
            resource.new = ctx.is_new_resource
        );
        let start = Instant::now();

        let result = self.read_parameter(ctx).instrument(span).await;
        metrics::record_operation("read", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn read_parameter(
        &self,
        ctx: &ReadContext,
    ) -> Result<Option<ParameterState>, ReconcileError> {
        debug!("Reading SSM Parameter: {}", ctx.id);

        let parameter = match self.fetch_parameter(ctx).await {
            Ok(parameter) => parameter,
            Err(e) if e.is_not_found() && !ctx.is_new_resource => {
                warn!("SSM Parameter ({}) not found, removing from state", ctx.id);
                return Ok(None);
            }
            Err(e) if e.is_not_found() => {
                return Err(ReconcileError::NotFoundAfterCreate {
                    name: ctx.id.clone(),
                })
            }
            Err(source) => {
                return Err(ReconcileError::Read {
                    name: ctx.id.clone(),
                    source,
                })
            }
        };

        let ciphertext = decode_ciphertext(&ctx.encrypted_value).map_err(|source| {
            ReconcileError::MalformedCiphertext {
                name: ctx.id.clone(),
                source,
            }
        })?;
        let comparison = compare(
            self.clients.decryptor.as_ref(),
            &ctx.encryption_key,
            &ciphertext,
            &parameter.value,
        )
        .await
        .map_err(|source| ReconcileError::Decrypt {
            name: ctx.id.clone(),
            source,
        })?;
        let encrypted_value = comparison.observed_value(&ctx.encrypted_value);

        if parameter.r#type != ParameterType::SecureString.as_str() {
            warn!(
                "SSM Parameter ({}) has type {}, expected {}",
                parameter.name,
                parameter.r#type,
                ParameterType::SecureString.as_str()
            );
        }

        let store = self.clients.store.as_ref();
        let name = parameter.name.clone();

        let Some(detail) = store
            .describe_parameter(&name)
            .await
            .map_err(|source| ReconcileError::Describe {
                name: name.clone(),
                source,
            })?
        else {
            warn!("SSM Parameter {:?} not found, removing from state", ctx.id);
            return Ok(None);
        };

        let data_type = detail.data_type.as_deref().and_then(|value| {
            let parsed = DataType::parse(value);
            if parsed.is_none() {
                warn!("SSM Parameter ({}) has unknown data type {}", name, value);
            }
            parsed
        });

        let tags = store
            .list_tags(&name, PARAMETER_RESOURCE_TYPE)
            .await
            .map_err(|source| ReconcileError::ListTags {
                name: name.clone(),
                source,
            })?
            .ignore_aws()
            .ignore_config(self.ignore_tags.as_ref());

        Ok(Some(ParameterState {
            id: ctx.id.clone(),
            name,
            description: detail.description,
            tier: detail.tier.unwrap_or(Tier::Standard),
            r#type: ParameterType::SecureString,
            encrypted_value,
            encryption_key: ctx.encryption_key.clone(),
            key_id: detail.key_id,
            arn: parameter.arn,
            data_type,
            overwrite: ctx.overwrite,
            allowed_pattern: detail.allowed_pattern,
            version: parameter.version,
            tags: tags.map(),
        }))
    }

    /// Decrypting get, polled while a new `aws:ec2:image` parameter is still being validated
    ///
    /// Once the window closes one more get is made and its outcome is final.
    async fn fetch_parameter(&self, ctx: &ReadContext) -> Result<Parameter, StoreError> {
        let store = self.clients.store.as_ref();
        let awaits_validation = ctx.awaits_validation();
        let backoff = FibonacciBackoff::new(self.config.poll_min, self.config.poll_max);

        let result = retry_until_deadline(
            self.config.creation_validation_timeout,
            backoff,
            || store.get_parameter(&ctx.id, true),
            |e: &StoreError| {
                let retry = awaits_validation && e.is_not_found();
                if retry {
                    debug!("SSM Parameter ({}) not visible yet, waiting for validation", ctx.id);
                    metrics::increment_validation_retries();
                }
                retry
            },
        )
        .await;

        match result {
            Ok(parameter) => Ok(parameter),
            Err(RetryError::Failed(e)) => Err(e),
            Err(RetryError::TimedOut(_)) => {
                warn!(
                    "SSM Parameter ({}) still not found after {:?}, making a final attempt",
                    ctx.id, self.config.creation_validation_timeout
                );
                store.get_parameter(&ctx.id, true).await
            }
        }
    }
}
