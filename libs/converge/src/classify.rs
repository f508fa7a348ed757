//! Transport-error classification.

use hmc_transport::{ConsoleErrorCode, TransportError};

/// What an operation should do with a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The failure means the action is effectively already applied;
    /// swallow it and proceed.
    Proceed,

    /// Treat as a no-op success: `changed = false`, no retry.
    SoftNoop,

    /// Surface verbatim with the action name attached.
    Fatal,
}

/// Where in an operation the failure occurred. The same code means
/// different things at different points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyContext {
    /// Existence pre-check before a create.
    ExistencePrecheck,

    /// Update/upgrade mutation pre-check.
    UpdateUpgrade,
}

/// Bucket a transport failure. Matching is on the typed console code
/// parsed at the transport boundary, never on message text.
pub fn classify(context: ClassifyContext, error: &TransportError) -> Disposition {
    match (context, error.code()) {
        (ClassifyContext::ExistencePrecheck, Some(ConsoleErrorCode::PartitionNotFound)) => {
            Disposition::Proceed
        }
        (ClassifyContext::UpdateUpgrade, Some(ConsoleErrorCode::InsufficientAuthority)) => {
            Disposition::SoftNoop
        }
        _ => Disposition::Fatal,
    }
}
