//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → optional TOML file (loader.rs)
//!     → environment overrides (loader.rs)
//!     → validation.rs (semantic checks, timeout ordering)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup and never reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid config refuses to start the process

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_startup_config, ConfigError};
pub use schema::{
    AgentConfig, AgentsConfig, CircuitBreakerConfig, GatewayConfig, HealthCheckConfig,
    InvocationConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServerTimeoutConfig,
    TransportConfig,
};
pub use validation::{validate_config, ValidationError};
