//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: a bounded number of probes test whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: after cool-down
//! Half-Open → Closed: a probe succeeds
//! Half-Open → Open: a probe fails (cool-down restarts from the failure)
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - `execute` is the only way to change state; counters are never exposed mutably
//! - Every transition or window reset starts a new generation; outcomes from
//!   calls admitted in an older generation are ignored
//! - A call whose future is dropped before it finishes is settled as a failure,
//!   so half-open probe slots cannot leak

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::routing::AgentKey;

/// Circuit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request accounting for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// A state transition, published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub agent: AgentKey,
    pub from: CircuitState,
    pub to: CircuitState,
}

/// The breaker rejected a call without running it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open for agent '{agent}'")]
pub struct CircuitOpenError {
    pub agent: AgentKey,
    /// Time left until the breaker will admit a probe, when known.
    pub retry_in: Option<Duration>,
}

/// Read-only view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub counts: Counts,
    pub generation: u64,
    /// When the breaker entered `state`.
    pub changed_at: Instant,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    changed_at: Instant,
    /// Closed: next window reset. Open: end of cool-down. Half-open: none.
    expiry: Option<Instant>,
}

/// Per-agent circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    agent: AgentKey,
    failure_threshold: u32,
    half_open_max_requests: u32,
    cool_down: Duration,
    interval: Option<Duration>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<StateChange>,
}

impl CircuitBreaker {
    /// Create a closed breaker with its own event channel.
    pub fn new(agent: AgentKey, config: &CircuitBreakerConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self::with_events(agent, config, events)
    }

    /// Create a closed breaker publishing transitions on a shared channel.
    pub fn with_events(
        agent: AgentKey,
        config: &CircuitBreakerConfig,
        events: broadcast::Sender<StateChange>,
    ) -> Self {
        let now = Instant::now();
        let interval = config.interval();
        Self {
            agent,
            failure_threshold: config.failure_threshold.max(1),
            half_open_max_requests: config.half_open_max_requests.max(1),
            cool_down: config.cool_down(),
            interval,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                changed_at: now,
                expiry: interval.map(|i| now + i),
            }),
            events,
        }
    }

    pub fn agent(&self) -> AgentKey {
        self.agent
    }

    /// Subscribe to this breaker's transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Current mode (applies a due Open → Half-Open transition).
    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    /// Current mode and counts.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        BreakerSnapshot {
            state: inner.state,
            counts: inner.counts,
            generation: inner.generation,
            changed_at: inner.changed_at,
        }
    }

    /// Run `operation` under the breaker.
    ///
    /// When the circuit is open (or half-open with every probe slot taken)
    /// the operation is not called and `CircuitOpenError` is returned through
    /// `E`. Otherwise the operation runs exactly once, `Ok` counts as a success
    /// and `Err` as a failure, and its result is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        let admission = self.admit()?;
        let result = operation().await;
        admission.settle(result.is_ok());
        result
    }

    fn admit(&self) -> Result<Admission<'_>, CircuitOpenError> {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        match inner.state {
            CircuitState::Open => Err(CircuitOpenError {
                agent: self.agent,
                retry_in: inner.expiry.map(|e| e.saturating_duration_since(now)),
            }),
            CircuitState::HalfOpen if inner.counts.requests >= self.half_open_max_requests => {
                Err(CircuitOpenError {
                    agent: self.agent,
                    retry_in: None,
                })
            }
            CircuitState::Closed | CircuitState::HalfOpen => {
                inner.counts.on_request();
                Ok(Admission {
                    breaker: self,
                    generation: inner.generation,
                    settled: false,
                })
            }
        }
    }

    fn record(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        if inner.generation != generation {
            return;
        }

        if success {
            inner.counts.on_success();
            if inner.state == CircuitState::HalfOpen {
                self.transition(&mut inner, CircuitState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match inner.state {
                CircuitState::Closed
                    if inner.counts.consecutive_failures >= self.failure_threshold =>
                {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
                CircuitState::HalfOpen => {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
                _ => {}
            }
        }
    }

    /// Apply time-driven changes: window reset while closed, end of cool-down.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            CircuitState::Closed => {
                if inner.expiry.is_some_and(|e| e <= now) {
                    self.new_generation(inner, now);
                }
            }
            CircuitState::Open => {
                if inner.expiry.is_some_and(|e| e <= now) {
                    self.transition(inner, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }

        inner.state = to;
        inner.changed_at = now;
        self.new_generation(inner, now);

        match to {
            CircuitState::Closed => {
                tracing::info!(agent = %self.agent, from = %from, to = %to, "Circuit breaker state change");
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                tracing::warn!(agent = %self.agent, from = %from, to = %to, "Circuit breaker state change");
            }
        }

        // No subscribers is fine.
        let _ = self.events.send(StateChange {
            agent: self.agent,
            from,
            to,
        });
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            CircuitState::Closed => self.interval.map(|i| now + i),
            CircuitState::Open => Some(now + self.cool_down),
            CircuitState::HalfOpen => None,
        };
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An admitted call. Settles as a failure if dropped unsettled.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Admission<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.generation, success);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(agent = %self.breaker.agent, "Guarded call abandoned before completion");
            self.breaker.record(self.generation, false);
        }
    }
}
