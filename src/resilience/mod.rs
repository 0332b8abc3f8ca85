//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Agent call:
//!     → deadline.rs (derive one deadline from caller + agent timeout)
//!     → circuit_breaker.rs (admit or fail fast, record the outcome)
//!     → [invoke::executor performs the HTTP call under the deadline]
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: agent calls are POSTs and not idempotent
//! - Circuit breaker prevents cascading failures
//! - Caller cancellations count as breaker failures

pub mod circuit_breaker;
pub mod deadline;

pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitOpenError, CircuitState, Counts, StateChange,
};
pub use deadline::{Deadline, DeadlineCause};
