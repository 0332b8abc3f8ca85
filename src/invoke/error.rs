//! Invocation failures.
//!
//! Every way an agent call can end without a usable reply maps to exactly one
//! `InvokeError` variant and one `FailureKind` label. The request handler
//! turns these into fallback replies; nothing here is caller-facing text.

use serde::Serialize;
use thiserror::Error;

use crate::resilience::{CircuitOpenError, DeadlineCause};
use crate::routing::AgentKey;

/// Stable classification of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BackendDisabled,
    UnknownBackend,
    CircuitOpen,
    DeadlineExceeded,
    TransportError,
    BadStatus,
    DecodeError,
}

impl FailureKind {
    /// Label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BackendDisabled => "backend_disabled",
            FailureKind::UnknownBackend => "unknown_backend",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::DeadlineExceeded => "deadline_exceeded",
            FailureKind::TransportError => "transport_error",
            FailureKind::BadStatus => "bad_status",
            FailureKind::DecodeError => "decode_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// The agent exists but is switched off in configuration.
    #[error("agent '{0}' is disabled")]
    BackendDisabled(AgentKey),

    /// The routing key is not one of the known agents.
    #[error("unknown agent '{0}'")]
    UnknownBackend(String),

    /// The breaker rejected the call without contacting the agent.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The derived deadline fired (caller cancellation, agent timeout or
    /// response-header timeout).
    #[error("agent '{agent}' call ended early: {cause}")]
    DeadlineExceeded { agent: AgentKey, cause: DeadlineCause },

    /// Connection-level failure. `connect` is set when the dial itself failed.
    #[error("agent '{agent}' transport error: {message}")]
    Transport {
        agent: AgentKey,
        connect: bool,
        message: String,
    },

    /// The agent answered with a non-2xx status.
    #[error("agent '{agent}' returned status {status}")]
    BadStatus { agent: AgentKey, status: u16 },

    /// A 2xx response whose body is not a valid agent reply.
    #[error("agent '{agent}' sent an undecodable reply: {message}")]
    Decode { agent: AgentKey, message: String },
}

impl InvokeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InvokeError::BackendDisabled(_) => FailureKind::BackendDisabled,
            InvokeError::UnknownBackend(_) => FailureKind::UnknownBackend,
            InvokeError::CircuitOpen(_) => FailureKind::CircuitOpen,
            InvokeError::DeadlineExceeded { .. } => FailureKind::DeadlineExceeded,
            InvokeError::Transport { .. } => FailureKind::TransportError,
            InvokeError::BadStatus { .. } => FailureKind::BadStatus,
            InvokeError::Decode { .. } => FailureKind::DecodeError,
        }
    }

    /// The deadline source, for `DeadlineExceeded`.
    pub fn deadline_cause(&self) -> Option<DeadlineCause> {
        match self {
            InvokeError::DeadlineExceeded { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}

/// Render an error with its source chain, e.g. `client error (Connect): tcp connect error: ...`.
pub(crate) fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
