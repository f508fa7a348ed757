//! Lifecycle operation drivers.
//!
//! Each operation is a single synchronous run of the convergence engine
//! against one target resource:
//!
//! ```text
//! VALIDATE -> RESOLVE_TARGET -> READ_CURRENT -> {NOOP | EXECUTE}
//!          -> POLL_CONVERGENCE -> {SUCCESS | SOFT_SUCCESS | FAILURE}
//! ```
//!
//! Transports are passed in as explicit handles so tests substitute
//! scripted fakes; nothing here holds ambient state.

pub mod cmd;
pub mod probe;
pub mod system;
pub mod target;
pub mod update;
pub mod vios;

use hmc_converge::{ConvergeError, ConvergeResult, OperationResult, ParameterSet};
use hmc_transport::ManagementRest;
use tracing::warn;

/// Coarse state of a powered-off managed system.
pub const POWERED_OFF_STATE: &str = "Power Off";

/// Fetch a validated string parameter.
///
/// Validation runs first, so a miss here is an internal inconsistency and
/// still surfaces as a constraint error rather than a panic.
pub(crate) fn required<'a>(params: &'a ParameterSet, name: &str) -> ConvergeResult<&'a str> {
    params
        .str_value(name)
        .ok_or_else(|| ConvergeError::Constraint(format!("mandatory parameter '{name}' is missing")))
}

/// Release a REST session, converting a failure into a caller-visible
/// warning so it never masks the operation's own outcome.
pub(crate) async fn close_session(rest: &dyn ManagementRest) -> Option<String> {
    match rest.close().await {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "failed to release console session");
            Some(format!("failed to release console session: {e}"))
        }
    }
}

/// Run the session release on every exit path of a REST-backed operation.
/// A close failure becomes a warning on success and is only logged on
/// failure, so it never masks the operation's own error.
pub(crate) async fn finish_rest(
    rest: &dyn ManagementRest,
    outcome: ConvergeResult<OperationResult>,
) -> ConvergeResult<OperationResult> {
    let close_warning = close_session(rest).await;
    match (outcome, close_warning) {
        (Ok(result), Some(warning)) if result.warning.is_none() => Ok(result.with_warning(warning)),
        (outcome, _) => outcome,
    }
}
