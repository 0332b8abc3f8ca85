//! Agent gateway library.
//!
//! Routes chat turns to backend agents by business modality, with one circuit
//! breaker per agent, a single deadline per call and a shared pooled transport.

// Core subsystems
pub mod config;
pub mod http;
pub mod invoke;
pub mod routing;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use invoke::{AgentInvoker, AgentReply, FailureKind, InvokeError};
pub use lifecycle::{Gateway, Shutdown};
