//! Deadline-bounded retry state machine for dpkg installs.
//!
//! [`RetryMachine`] never sleeps and never runs dpkg. The caller feeds it an
//! [`Input`] and carries out the [`Action`] it returns, so the deadline
//! boundary can be exercised directly with hand-picked instants.
//!
//! ```text
//! Idle ──Invoke──► Attempting ──Installed──► Installed ──► Done
//!                   ▲    │
//!      BackoffElapsed    ├──Locked (before deadline)──► Locked
//!                   │    │                                │
//!                   └────┼────────────────────────────────┘
//!                        ├──Locked (deadline elapsed)──► TimedOut ──► Done
//!                        └──Failed──────────────────────► Failed ────► Done
//! ```

use mapfs_constants::dpkg::LOCKED_ERROR_LINE;
use mapfs_constants::timing::{DEFAULT_BACKOFF_MS, DEFAULT_DEADLINE_SECS};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Log target of the locked-signal line. The binary keeps this target at
/// `warn` or more verbose whatever the configured level.
pub const LOCK_LOG_TARGET: &str = "mapfs_prestart::lock";

// =============================================================================
// States, inputs and actions
// =============================================================================

/// Installer retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Hook invoked, nothing attempted yet.
    Idle,
    /// An install primitive call is in flight.
    Attempting,
    /// Last attempt hit the dpkg lock; waiting out the backoff.
    Locked,
    /// Install primitive succeeded.
    Installed,
    /// Deadline elapsed while still contended.
    TimedOut,
    /// Install primitive failed for a reason other than the lock.
    Failed,
    /// Terminal; the verdict has been handed to the caller.
    Done,
}

impl RetryState {
    /// Returns the state name for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Attempting => "attempting",
            Self::Locked => "locked",
            Self::Installed => "installed",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }

    /// Returns true once no further input is accepted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Classified result of one install primitive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// dpkg installed the packages.
    Installed,
    /// dpkg reported the status database locked by another process.
    Locked,
    /// dpkg failed for any other reason.
    Failed(String),
}

/// Input driving the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The hook was invoked.
    Invoke,
    /// An install attempt finished.
    Attempted(AttemptResult),
    /// The backoff requested by [`Action::Wait`] has elapsed.
    BackoffElapsed,
}

impl Input {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Invoke => "invoke",
            Self::Attempted(AttemptResult::Installed) => "attempt_installed",
            Self::Attempted(AttemptResult::Locked) => "attempt_locked",
            Self::Attempted(AttemptResult::Failed(_)) => "attempt_failed",
            Self::BackoffElapsed => "backoff_elapsed",
        }
    }
}

/// What the caller must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Call the install primitive once.
    Install,
    /// Sleep for the given duration, then send [`Input::BackoffElapsed`].
    Wait(Duration),
    /// Stop; the attempt is over.
    Finish(Verdict),
}

/// Terminal result of the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The install primitive succeeded before the deadline.
    Installed,
    /// The lock was still held when the deadline elapsed.
    TimedOut,
    /// The install primitive failed without contention.
    Failed(String),
}

/// Errors from driving the machine out of order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    /// The input is not valid in the current state.
    #[error("invalid retry transition: {input} while {state}")]
    InvalidTransition {
        /// State the machine was in.
        state: &'static str,
        /// Input that was rejected.
        input: &'static str,
    },
}

// =============================================================================
// Policy
// =============================================================================

/// Fixed-backoff retry policy bounded by a hard deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts while locked.
    pub backoff: Duration,
    /// Budget for the whole attempt, measured from invocation.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
        }
    }
}

// =============================================================================
// Machine
// =============================================================================

/// Retry state machine for one installer attempt.
#[derive(Debug)]
pub struct RetryMachine {
    state: RetryState,
    policy: RetryPolicy,
    started: Instant,
    attempts: u32,
    locked_events: u32,
}

impl RetryMachine {
    /// Creates a machine whose deadline counts from `started`.
    #[must_use]
    pub fn new(policy: RetryPolicy, started: Instant) -> Self {
        Self {
            state: RetryState::Idle,
            policy,
            started,
            attempts: 0,
            locked_events: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Number of install primitive calls requested so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Number of attempts that hit the dpkg lock.
    #[must_use]
    pub fn locked_events(&self) -> u32 {
        self.locked_events
    }

    /// Instant at which contention stops being retried.
    ///
    /// `None` when the deadline lies beyond what `Instant` can represent;
    /// such a deadline never elapses.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.started.checked_add(self.policy.deadline)
    }

    /// Returns true if `now` is at or past the deadline.
    #[must_use]
    pub fn deadline_elapsed(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Applies `input` observed at `now` and returns the next action.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::InvalidTransition`] if `input` is not valid in
    /// the current state. The state is left unchanged.
    pub fn step(&mut self, input: Input, now: Instant) -> Result<Action, RetryError> {
        match (self.state, input) {
            (RetryState::Idle, Input::Invoke) | (RetryState::Locked, Input::BackoffElapsed) => {
                self.attempts += 1;
                self.transition(RetryState::Attempting);
                Ok(Action::Install)
            }
            (RetryState::Attempting, Input::Attempted(AttemptResult::Installed)) => {
                self.transition(RetryState::Installed);
                Ok(self.finish(Verdict::Installed))
            }
            (RetryState::Attempting, Input::Attempted(AttemptResult::Locked)) => {
                self.locked_events += 1;
                if self.deadline_elapsed(now) {
                    tracing::warn!(
                        target: LOCK_LOG_TARGET,
                        attempt = self.attempts,
                        "{LOCKED_ERROR_LINE}"
                    );
                    self.transition(RetryState::TimedOut);
                    return Ok(self.finish(Verdict::TimedOut));
                }

                let delay = self.next_delay(now);
                tracing::warn!(
                    target: LOCK_LOG_TARGET,
                    attempt = self.attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "{LOCKED_ERROR_LINE}"
                );
                self.transition(RetryState::Locked);
                Ok(Action::Wait(delay))
            }
            (RetryState::Attempting, Input::Attempted(AttemptResult::Failed(reason))) => {
                self.transition(RetryState::Failed);
                Ok(self.finish(Verdict::Failed(reason)))
            }
            (state, input) => Err(RetryError::InvalidTransition {
                state: state.as_str(),
                input: input.as_str(),
            }),
        }
    }

    /// Backoff clamped to what is left of the deadline, so the final attempt
    /// lands on the deadline instead of a full backoff past it.
    fn next_delay(&self, now: Instant) -> Duration {
        match self.deadline() {
            Some(deadline) => self
                .policy
                .backoff
                .min(deadline.saturating_duration_since(now)),
            None => self.policy.backoff,
        }
    }

    fn finish(&mut self, verdict: Verdict) -> Action {
        self.transition(RetryState::Done);
        Action::Finish(verdict)
    }

    fn transition(&mut self, to: RetryState) {
        tracing::debug!(
            from = self.state.as_str(),
            to = to.as_str(),
            "retry transition"
        );
        self.state = to;
    }
}
