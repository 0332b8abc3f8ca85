//! Deadline derivation for agent calls.
//!
//! # Responsibilities
//! - Combine the caller's cancellation, the caller's own deadline, the
//!   configured agent timeout and transport sub-timeouts into one deadline
//! - Report which source fired
//! - Bound any future by that deadline
//!
//! # Precedence
//! ```text
//! caller cancellation      fires whenever the caller's token is cancelled
//! timed sources            caller deadline, agent timeout, response headers
//! effective expiry         = earliest timed source; ties keep the outer source
//! ```
//!
//! # Design Decisions
//! - A `Deadline` is a value, not a background task: waiting on it selects
//!   over the caller token and a timer, and dropping the wait releases both
//! - Narrowing never extends a deadline

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The source that ended a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlineCause {
    /// The caller's cancellation signal fired.
    CallerCanceled,
    /// The caller's own deadline was reached.
    CallerDeadline,
    /// The configured per-call agent timeout elapsed.
    AgentTimeout,
    /// The backend did not send response headers in time.
    ResponseHeaders,
}

impl DeadlineCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineCause::CallerCanceled => "caller_canceled",
            DeadlineCause::CallerDeadline => "caller_deadline",
            DeadlineCause::AgentTimeout => "agent_timeout",
            DeadlineCause::ResponseHeaders => "response_headers",
        }
    }
}

impl std::fmt::Display for DeadlineCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived deadline: caller cancellation plus the earliest timed source.
#[derive(Debug, Clone)]
pub struct Deadline {
    cancel: CancellationToken,
    expires_at: Option<Instant>,
    cause: DeadlineCause,
}

impl Deadline {
    /// A deadline that only ends when the caller cancels.
    pub fn from_caller(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            expires_at: None,
            cause: DeadlineCause::CallerDeadline,
        }
    }

    /// Deadline for one agent call: `min(caller, now + agent_timeout)`.
    pub fn for_call(cancel: &CancellationToken, agent_timeout: Duration) -> Self {
        Self::from_caller(cancel.clone()).narrowed(agent_timeout, DeadlineCause::AgentTimeout)
    }

    /// Apply the caller's own absolute deadline.
    pub fn with_caller_deadline(self, at: Instant) -> Self {
        self.narrowed_at(at, DeadlineCause::CallerDeadline)
    }

    /// A deadline no later than this one and no later than `now + budget`.
    pub fn narrowed(&self, budget: Duration, cause: DeadlineCause) -> Self {
        self.narrowed_at(Instant::now() + budget, cause)
    }

    fn narrowed_at(&self, at: Instant, cause: DeadlineCause) -> Self {
        match self.expires_at {
            Some(current) if current <= at => self.clone(),
            _ => Self {
                cancel: self.cancel.clone(),
                expires_at: Some(at),
                cause,
            },
        }
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Time left before the timed sources fire.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// The cause, if the deadline has already passed.
    pub fn check(&self) -> Option<DeadlineCause> {
        if self.cancel.is_cancelled() {
            return Some(DeadlineCause::CallerCanceled);
        }
        match self.expires_at {
            Some(at) if at <= Instant::now() => Some(self.cause),
            _ => None,
        }
    }

    /// Resolve when the deadline fires.
    pub async fn expired(&self) -> DeadlineCause {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => DeadlineCause::CallerCanceled,
            _ = sleep_until(self.expires_at) => self.cause,
        }
    }

    /// Drive `future` to completion unless the deadline fires first.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, DeadlineCause> {
        tokio::select! {
            biased;
            cause = self.expired() => Err(cause),
            output = future => Ok(output),
        }
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
