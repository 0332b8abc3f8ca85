//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → active.rs (probe every enabled agent concurrently, dedicated client)
//!     → state.rs (per-agent ok | disabled | unreachable, overall ok | degraded)
//! ```
//!
//! # Design Decisions
//! - Probes run on demand, there is no background checker
//! - Health is independent of circuit breaker state
//! - Disabled agents are reported, never probed

pub mod active;
pub mod state;

pub use active::HealthProber;
pub use state::{AgentHealth, HealthReport, OverallHealth};
