//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound "modalidad" field
//!     → key.rs (normalize, map to AgentKey or nothing)
//!     → registry.rs (descriptor lookup: enabled flag + URL)
//!     → Return: BackendDescriptor or explicit unknown
//!
//! Registry construction (at startup):
//!     AgentsConfig
//!     → Parse URLs
//!     → Freeze as immutable BackendRegistry
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - One endpoint per key (no load balancing)
//! - Explicit no-match rather than silent default

pub mod key;
pub mod registry;

pub use key::{resolve_modality, AgentKey, UnknownAgentKey, MODALITY_TABLE};
pub use registry::{BackendDescriptor, BackendRegistry};
