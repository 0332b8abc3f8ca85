//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → chat.rs (decode, validate, modality → agent)
//!     → [invoke layer calls the agent]
//!     → chat.rs (reply or fallback envelope)
//!     → Send to client
//! ```

pub mod chat;
pub mod request;
pub mod server;

pub use chat::{ChatConfig, ChatRequest, ChatResponse, FALLBACK_REPLY};
pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
