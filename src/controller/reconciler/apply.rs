//! # Apply
//!
//! Whole-parameter flows built on put/read/delete:
//! - `refresh`: re-read the managed parameter against the declaration
//! - `apply`: refresh, plan, then create, update, replace or do nothing
//! - `import`: adopt an existing parameter by name
//! - `destroy`: delete the managed parameter

use super::{ReadContext, ReconcileError, Reconciler};
use crate::controller::plan::{plan, Plan, PlanAction};
use crate::state::ParameterState;
use crate::ParameterSpec;
use tracing::{info, warn};

/// Result of [`Reconciler::apply`]
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// The plan that was carried out
    pub plan: Plan,
    /// State to persist; `None` when the parameter no longer exists
    pub state: Option<ParameterState>,
}

impl Reconciler {
    /// Re-read the parameter recorded in `prior`
    ///
    /// The stored value is compared against the declared ciphertext, so a
    /// stale marker in `prior` does not leak into the comparison.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub async fn refresh(
        &self,
        desired: &ParameterSpec,
        prior: Option<&ParameterState>,
    ) -> Result<Option<ParameterState>, ReconcileError> {
        let Some(prior) = prior else {
            return Ok(None);
        };
        let ctx = ReadContext::for_spec(prior.id.clone(), desired, false);
        let refreshed = self.read(&ctx).await?;
        if refreshed.is_none() {
            warn!("SSM Parameter ({}) no longer exists", prior.id);
        }
        Ok(refreshed)
    }

    /// Refresh, then plan against the refreshed state
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub async fn plan(
        &self,
        desired: &ParameterSpec,
        prior: Option<&ParameterState>,
    ) -> Result<(Plan, Option<ParameterState>), ReconcileError> {
        let current = self.refresh(desired, prior).await?;
        Ok((plan(desired, current.as_ref()), current))
    }

    /// Converge the parameter on `desired`
    ///
    /// # Errors
    ///
    /// Returns the first failing step. On a failed replace the old parameter
    /// may already be deleted.
    pub async fn apply(
        &self,
        desired: &ParameterSpec,
        prior: Option<&ParameterState>,
    ) -> Result<ApplyOutcome, ReconcileError> {
        let (plan, current) = self.plan(desired, prior).await?;
        info!("{}", plan);

        let state = match &plan.action {
            PlanAction::NoChange => current,
            PlanAction::Create => self.put(desired, None).await?,
            PlanAction::Update => self.put(desired, current.as_ref()).await?,
            PlanAction::Replace(_) => {
                if let Some(existing) = current.as_ref() {
                    self.delete(existing).await?;
                }
                self.put(desired, None).await?
            }
        };

        Ok(ApplyOutcome { plan, state })
    }

    /// Adopt an existing parameter named `id` under the declaration
    ///
    /// Returns `Ok(None)` when no such parameter exists.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub async fn import(
        &self,
        desired: &ParameterSpec,
        id: &str,
    ) -> Result<Option<ParameterState>, ReconcileError> {
        info!("Importing SSM Parameter: {}", id);
        let ctx = ReadContext::for_spec(id, desired, false);
        self.read(&ctx).await
    }

    /// Delete the parameter recorded in `prior`, if any
    ///
    /// # Errors
    ///
    /// Propagates delete failures.
    pub async fn destroy(&self, prior: Option<&ParameterState>) -> Result<(), ReconcileError> {
        match prior {
            Some(state) => self.delete(state).await,
            None => {
                info!("No SSM Parameter recorded in state, nothing to destroy");
                Ok(())
            }
        }
    }
}
