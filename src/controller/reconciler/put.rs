//! # Put
//!
//! Create and update share one path: decrypt the declared ciphertext, write
//! the plaintext with the declared key, sync tags, then read back.

use super::tags::update_tags;
use super::{should_overwrite, ReadContext, ReconcileError, Reconciler};
use crate::controller::comparator::{decode_ciphertext, decrypt_declared};
use crate::observability::metrics;
use crate::provider::PutParameterInput;
use crate::state::ParameterState;
use crate::tags::KeyValueTags;
use crate::{ParameterSpec, Tier};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

impl Reconciler {
    /// Write `desired`, treating `prior` as the current state
    ///
    /// `prior == None` means the parameter is being created: overwrite
    /// defaults to `false` and a missing parameter after the write is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the ciphertext cannot be decoded or decrypted, the
    /// write or tag update fails, or the trailing read fails.
    pub async fn put(
        &self,
        desired: &ParameterSpec,
        prior: Option<&ParameterState>,
    ) -> Result<Option<ParameterState>, ReconcileError> {
        let is_new_resource = prior.is_none();
        let span = info_span!(
            "ssm.parameter.put",
            parameter.name = %desired.name,
            parameter.tier = %desired.tier,
            resource.new = is_new_resource
        );
        let start = Instant::now();

        let result = self
            .put_parameter(desired, prior, is_new_resource)
            .instrument(span)
            .await;
        metrics::record_operation("put", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn put_parameter(
        &self,
        desired: &ParameterSpec,
        prior: Option<&ParameterState>,
        is_new_resource: bool,
    ) -> Result<Option<ParameterState>, ReconcileError> {
        let name = desired.name.as_str();
        info!("Writing SSM Parameter: {}", name);

        let ciphertext = decode_ciphertext(&desired.encrypted_value).map_err(|source| {
            ReconcileError::MalformedCiphertext {
                name: name.to_string(),
                source,
            }
        })?;
        let plaintext = decrypt_declared(
            self.clients.decryptor.as_ref(),
            &desired.encryption_key,
            &ciphertext,
        )
        .await
        .map_err(|source| ReconcileError::Decrypt {
            name: name.to_string(),
            source,
        })?;
        let value = std::str::from_utf8(&plaintext)
            .map(|text| Zeroizing::new(text.to_string()))
            .map_err(|source| ReconcileError::InvalidPlaintext {
                name: name.to_string(),
                source,
            })?;

        let mut input = PutParameterInput {
            name: name.to_string(),
            r#type: desired.r#type,
            tier: Some(desired.tier),
            value,
            overwrite: should_overwrite(desired.overwrite, is_new_resource),
            allowed_pattern: desired.allowed_pattern.clone().unwrap_or_default(),
            data_type: desired.data_type,
            description: changed_description(desired, prior),
            key_id: desired.encryption_key.clone(),
        };

        let store = self.clients.store.as_ref();
        debug!("Waiting for SSM Parameter {} to be updated", name);
        let first_attempt = store.put_parameter(&input).await;
        let written = match first_attempt {
            Err(e) if e.is_tier_not_supported() => {
                warn!(
                    "Tier {} is not supported for SSM Parameter ({}), retrying with the default tier",
                    desired.tier, name
                );
                input.tier = None;
                store.put_parameter(&input).await
            }
            other => other,
        };
        let version = written.map_err(|source| ReconcileError::Write {
            name: name.to_string(),
            source,
        })?;
        debug!("SSM Parameter {} written at version {}", name, version);

        // The parameter exists from here on; later failures carry its identity
        let committed = |source: ReconcileError| {
            warn!("SSM Parameter ({}) was written but not fully reconciled", name);
            ReconcileError::Incomplete {
                state: Box::new(committed_state(desired, input.tier, version)),
                source: Box::new(source),
            }
        };

        let old_tags = prior.map_or_else(KeyValueTags::new, |p| KeyValueTags::from(&p.tags));
        let new_tags = KeyValueTags::from(&desired.tags);
        if old_tags != new_tags {
            update_tags(store, name, &old_tags, &new_tags)
                .await
                .map_err(|source| {
                    committed(ReconcileError::Tagging {
                        name: name.to_string(),
                        source,
                    })
                })?;
        }

        let ctx = ReadContext::for_spec(name, desired, is_new_resource);
        self.read(&ctx).await.map_err(committed)
    }
}

/// State recorded for a parameter whose write committed but whose read-back
/// did not complete; the next refresh replaces every observed field
fn committed_state(desired: &ParameterSpec, tier: Option<Tier>, version: i64) -> ParameterState {
    ParameterState {
        id: desired.name.clone(),
        name: desired.name.clone(),
        description: desired.description.clone(),
        tier: tier.unwrap_or_default(),
        r#type: desired.r#type,
        encrypted_value: desired.encrypted_value.clone(),
        encryption_key: desired.encryption_key.clone(),
        key_id: Some(desired.encryption_key.clone()),
        arn: None,
        data_type: desired.data_type,
        overwrite: desired.overwrite,
        allowed_pattern: desired.allowed_pattern.clone(),
        version,
        tags: desired.tags.clone(),
    }
}

/// New description when it differs from the prior one; unset and empty are equal
fn changed_description(desired: &ParameterSpec, prior: Option<&ParameterState>) -> Option<String> {
    let old = prior.and_then(|p| p.description.as_deref()).unwrap_or_default();
    let new = desired.description.as_deref().unwrap_or_default();
    (old != new).then(|| new.to_string())
}
