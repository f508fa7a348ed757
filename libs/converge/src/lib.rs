//! Reconciliation and convergence engine for console lifecycle operations.
//!
//! Every operation against the console follows the same path:
//!
//! - **Validate**: check caller parameters against the action's constraint
//!   profile, before any network traffic.
//! - **Diff**: project desired attributes and compare against live state so
//!   re-invocations converge instead of re-mutating.
//! - **Execute**: issue exactly one mutating call when a change is needed.
//! - **Converge**: poll coarse state at a fixed interval until a terminal
//!   condition or the deadline.
//! - **Classify**: bucket transport failures into proceed / soft no-op /
//!   fatal.
//!
//! # Invariants
//!
//! - Validation never performs a remote call
//! - A no-op diff issues zero mutating calls
//! - Constraint and not-found failures abort before any mutation
//! - No partial state is ever reported as success

pub mod action;
pub mod classify;
pub mod diff;
pub mod error;
pub mod outcome;
pub mod params;
pub mod poll;
pub mod profile;
pub mod state;

pub use action::Action;
pub use classify::{classify, ClassifyContext, Disposition};
pub use diff::is_noop;
pub use error::{ConvergeError, ConvergeResult};
pub use outcome::OperationResult;
pub use params::{ParamValue, ParameterSet};
pub use poll::{
    BootConvergence, BootProbe, BootSignals, Clock, ConvergenceCriterion, ManualClock, Poller,
    StateProbe, SystemClock, DEFAULT_DEADLINE_MINUTES, MIN_DEADLINE_MINUTES, RMC_WARNING,
};
pub use profile::{validate, validate_profile, ConstraintProfile};
pub use state::project_current;
