//! # Delete

use super::{ReconcileError, Reconciler};
use crate::observability::metrics;
use crate::state::ParameterState;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

impl Reconciler {
    /// Delete the parameter recorded in `state`
    ///
    /// Not idempotent: a parameter that is already gone is reported as an error.
    ///
    /// # Errors
    ///
    /// Returns any failure of the delete call, including not-found.
    pub async fn delete(&self, state: &ParameterState) -> Result<(), ReconcileError> {
        let span = info_span!("ssm.parameter.delete", parameter.name = %state.name);
        let start = Instant::now();

        let result = async {
            info!("Deleting SSM Parameter: {}", state.id);
            self.clients
                .store
                .delete_parameter(&state.name)
                .await
                .map_err(|source| ReconcileError::Delete {
                    name: state.id.clone(),
                    source,
                })
        }
        .instrument(span)
        .await;

        metrics::record_operation("delete", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }
}
