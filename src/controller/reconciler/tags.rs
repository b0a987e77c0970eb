//! # Tag Reconciliation
//!
//! Applies the difference between two tag sets with at most one remove call
//! and one add call. Reserved `aws:` keys are never sent.

use crate::constants::PARAMETER_RESOURCE_TYPE;
use crate::observability::metrics;
use crate::provider::{ParameterStore, StoreError};
use crate::tags::KeyValueTags;
use tracing::debug;

/// Move the parameter's tags from `old` to `new`
///
/// # Errors
///
/// Returns the first failing tag call. A failed remove skips the add.
pub async fn update_tags(
    store: &dyn ParameterStore,
    identifier: &str,
    old: &KeyValueTags,
    new: &KeyValueTags,
) -> Result<(), StoreError> {
    let removed = old.removed(new).ignore_aws();
    let updated = old.updated(new).ignore_aws();

    if !removed.is_empty() {
        let keys = removed.keys();
        debug!(resource = %identifier, keys = ?keys, "Removing tags");
        store
            .remove_tags(identifier, PARAMETER_RESOURCE_TYPE, &keys)
            .await?;
        metrics::increment_tag_mutations("remove");
    }

    if !updated.is_empty() {
        debug!(resource = %identifier, keys = ?updated.keys(), "Adding tags");
        store
            .add_tags(identifier, PARAMETER_RESOURCE_TYPE, &updated)
            .await?;
        metrics::increment_tag_mutations("add");
    }

    Ok(())
}
