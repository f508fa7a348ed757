//! Error taxonomy for lifecycle operations.

use thiserror::Error;

use hmc_transport::TransportError;

use crate::action::Action;

pub type ConvergeResult<T> = Result<T, ConvergeError>;

/// Terminal failures of a lifecycle invocation.
///
/// Constraint and not-found failures always abort before any mutating
/// call. Every variant renders to a single human-readable message.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Parameter validation failed; no network was touched.
    #[error("{0}")]
    Constraint(String),

    /// The target resource does not exist on the console.
    #[error("{0}")]
    TargetNotFound(String),

    /// The target exists but is not in a state the operation can act on.
    #[error("{0}")]
    Precondition(String),

    /// A transport failure not matched by the error classifier.
    #[error("{action}: {source}")]
    Transport {
        action: Action,
        #[source]
        source: TransportError,
    },

    /// The command was issued but the terminal state was not reached
    /// within the deadline.
    #[error("{resource} did not reach the requested state within {waited_mins} mins, last state: {last_state}")]
    ConvergenceTimeout {
        resource: String,
        last_state: String,
        waited_mins: u64,
    },

    /// Boot-style convergence ended with a reference code that signals a
    /// failed installation.
    #[error("installation of {resource} failed even after waiting for {waited_mins} mins and the reference code is {ref_code}")]
    BootFailed {
        resource: String,
        ref_code: String,
        waited_mins: u64,
    },
}

impl ConvergeError {
    /// Attach the action name to a raw transport failure.
    pub fn transport(action: Action, source: TransportError) -> Self {
        Self::Transport { action, source }
    }

    /// True for failures the caller should report as usage errors.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_failure_message_carries_reference_code() {
        let err = ConvergeError::BootFailed {
            resource: "vios1".to_string(),
            ref_code: "E1234".to_string(),
            waited_mins: 60,
        };
        let msg = err.to_string();
        assert!(msg.contains("E1234"));
        assert!(msg.contains("60"));
    }

    #[test]
    fn transport_failure_names_the_action() {
        let err = ConvergeError::transport(
            Action::ModifySysConfig,
            TransportError::command("HSCL1402 unexpected"),
        );
        assert!(err.to_string().starts_with("modify_syscfg:"));
    }

    #[test]
    fn only_constraint_errors_are_validation_failures() {
        assert!(ConvergeError::Constraint("x".into()).is_validation());
        assert!(!ConvergeError::TargetNotFound("x".into()).is_validation());
    }
}
