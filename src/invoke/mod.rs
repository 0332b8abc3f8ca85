//! Agent invocation subsystem.
//!
//! # Data Flow
//! ```text
//! invoke(cancel, key, message, session_id, context)
//!     → invoker.rs (key → backend, derive deadline)
//!     → resilience::CircuitBreaker::execute
//!     → executor.rs (POST on the shared pool, header timeout, drain)
//!     → wire.rs (encode request, decode reply)
//!     → Result<AgentReply, InvokeError> (error.rs)
//! ```

pub mod error;
pub mod executor;
pub mod invoker;
pub mod wire;

pub use error::{FailureKind, InvokeError};
pub use executor::AgentTransport;
pub use invoker::AgentInvoker;
pub use wire::{AgentReply, AgentRequest};
