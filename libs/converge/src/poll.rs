//! Bounded convergence polling.
//!
//! The poller blocks the invocation, fetching coarse state at a fixed
//! interval until a terminal condition or the deadline. Time is accessed
//! through the [`Clock`] trait so timeout and soft-success branches are
//! testable without wall-clock waits.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use hmc_transport::TransportError;

use crate::action::Action;
use crate::error::{ConvergeError, ConvergeResult};

/// Fixed interval between state fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Deadlines below this are rejected before any remote call.
pub const MIN_DEADLINE_MINUTES: i64 = 10;

/// Deadline applied when the caller does not supply one.
pub const DEFAULT_DEADLINE_MINUTES: i64 = 60;

/// Reference code the console reports when nothing is wrong.
pub const CLEAR_REF_CODE: &str = "00";

/// Coarse state of a fully-booted partition.
pub const BOOTED_STATE: &str = "Running";

/// Warning attached to soft-success boot convergence.
pub const RMC_WARNING: &str =
    "installation succeeded but RMC did not come up, please check the HMC firewall and security settings";

/// Time source for the poller.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time via the tokio timer.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual time for tests: `sleep` advances `now` instantly.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

/// Acceptable terminal states plus an overall deadline.
#[derive(Debug, Clone)]
pub struct ConvergenceCriterion {
    pub acceptable: Vec<String>,
    pub deadline: Duration,
}

impl ConvergenceCriterion {
    /// Build a criterion, rejecting too-short deadlines up front.
    pub fn new<I, S>(acceptable: I, deadline_minutes: Option<i64>) -> ConvergeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let minutes = deadline_minutes.unwrap_or(DEFAULT_DEADLINE_MINUTES);
        if minutes < MIN_DEADLINE_MINUTES {
            return Err(ConvergeError::Constraint(format!(
                "timeout should be more than {MIN_DEADLINE_MINUTES} mins"
            )));
        }
        Ok(Self {
            acceptable: acceptable.into_iter().map(Into::into).collect(),
            deadline: Duration::from_secs(minutes as u64 * 60),
        })
    }

    pub fn deadline_mins(&self) -> u64 {
        self.deadline.as_secs() / 60
    }
}

/// Fetches the coarse state of one target resource.
#[async_trait]
pub trait StateProbe: Send + Sync {
    async fn coarse_state(&self) -> Result<String, TransportError>;
}

/// Post-boot health signals of a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSignals {
    /// Management-connectivity channel is up.
    pub rmc_active: bool,

    /// Hardware reference code; empty or "00" means clear.
    pub ref_code: String,
}

/// Probe for boot-style convergence: coarse state plus health signals.
#[async_trait]
pub trait BootProbe: StateProbe {
    async fn boot_signals(&self) -> Result<BootSignals, TransportError>;
}

/// How boot-style convergence ended short of a fatal reference code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootConvergence {
    /// Partition booted and the management connection is active.
    Connected,

    /// Partition booted (or the deadline ran out) with a clear reference
    /// code but no management connection; callers attach [`RMC_WARNING`].
    ConnectivityPending,
}

/// The blocking wait loop.
pub struct Poller {
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Poller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll until the state enters the acceptable set or the deadline
    /// elapses.
    pub async fn wait_for(
        &self,
        probe: &dyn StateProbe,
        criterion: &ConvergenceCriterion,
        action: Action,
        resource: &str,
    ) -> ConvergeResult<String> {
        let started = self.clock.now();
        loop {
            let state = probe
                .coarse_state()
                .await
                .map_err(|e| ConvergeError::transport(action, e))?;
            if criterion.acceptable.iter().any(|s| *s == state) {
                return Ok(state);
            }
            if self.clock.now().duration_since(started) >= criterion.deadline {
                return Err(ConvergeError::ConvergenceTimeout {
                    resource: resource.to_string(),
                    last_state: state,
                    waited_mins: criterion.deadline_mins(),
                });
            }
            debug!(resource, state = %state, "state not terminal yet");
            self.clock.sleep(self.interval).await;
        }
    }

    /// Two-staged convergence for boot-style operations.
    ///
    /// Stage one waits for the fully-booted state. Stage two reads the
    /// connectivity indicator and reference code and classifies. When the
    /// deadline runs out during stage one the signals are still read once:
    /// a clear reference code downgrades the timeout to a soft success.
    pub async fn wait_for_boot(
        &self,
        probe: &dyn BootProbe,
        deadline: Duration,
        action: Action,
        resource: &str,
    ) -> ConvergeResult<BootConvergence> {
        let started = self.clock.now();
        loop {
            let state = probe
                .coarse_state()
                .await
                .map_err(|e| ConvergeError::transport(action, e))?;
            if state == BOOTED_STATE {
                break;
            }
            if self.clock.now().duration_since(started) >= deadline {
                debug!(resource, state = %state, "deadline spent before full boot");
                break;
            }
            self.clock.sleep(self.interval).await;
        }

        let signals = probe
            .boot_signals()
            .await
            .map_err(|e| ConvergeError::transport(action, e))?;

        if signals.rmc_active {
            Ok(BootConvergence::Connected)
        } else if signals.ref_code.is_empty() || signals.ref_code == CLEAR_REF_CODE {
            Ok(BootConvergence::ConnectivityPending)
        } else {
            Err(ConvergeError::BootFailed {
                resource: resource.to_string(),
                ref_code: signals.ref_code,
                waited_mins: deadline.as_secs() / 60,
            })
        }
    }
}
