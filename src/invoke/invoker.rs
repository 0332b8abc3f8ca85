//! Invocation façade.
//!
//! # Responsibilities
//! - Resolve a routing key to an enabled backend
//! - Derive the call deadline from the caller's cancellation signal
//! - Gate the call through that backend's circuit breaker
//! - Record per-agent metrics for every outcome
//!
//! # Design Decisions
//! - One breaker per agent, created up front and never replaced
//! - All breakers publish on one transition channel
//! - Disabled and unknown agents fail before the breaker and never count
//!   against it

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::invoke::error::InvokeError;
use crate::invoke::executor::AgentTransport;
use crate::invoke::wire::{AgentReply, AgentRequest};
use crate::observability::metrics;
use crate::resilience::{BreakerSnapshot, CircuitBreaker, Deadline, DeadlineCause, StateChange};
use crate::routing::{AgentKey, BackendRegistry};

const TRANSITION_CHANNEL_CAPACITY: usize = 256;

/// Routes chat turns to agents through per-agent circuit breakers.
#[derive(Debug)]
pub struct AgentInvoker {
    registry: Arc<BackendRegistry>,
    breakers: BTreeMap<AgentKey, CircuitBreaker>,
    transport: AgentTransport,
    agent_timeout: Duration,
    transitions: broadcast::Sender<StateChange>,
}

impl AgentInvoker {
    pub fn new(config: &GatewayConfig, registry: Arc<BackendRegistry>) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let breakers = AgentKey::ALL
            .into_iter()
            .map(|key| {
                (
                    key,
                    CircuitBreaker::with_events(key, &config.circuit_breaker, transitions.clone()),
                )
            })
            .collect();

        Self {
            registry,
            breakers,
            transport: AgentTransport::new(&config.transport),
            agent_timeout: config.invocation.agent_timeout(),
            transitions,
        }
    }

    /// Breaker transitions of every agent, in the order they happen.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<StateChange> {
        self.transitions.subscribe()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn breaker_snapshot(&self, agent: AgentKey) -> Option<BreakerSnapshot> {
        self.breakers.get(&agent).map(CircuitBreaker::snapshot)
    }

    /// Send one chat turn to the agent named by `key`.
    ///
    /// The call ends at the earliest of `cancel` firing or the configured
    /// agent timeout.
    pub async fn invoke(
        &self,
        cancel: &CancellationToken,
        key: &str,
        message: impl Into<String>,
        session_id: u64,
        context: Map<String, Value>,
    ) -> Result<AgentReply, InvokeError> {
        self.invoke_within(
            Deadline::from_caller(cancel.clone()),
            key,
            AgentRequest::new(message, session_id, context),
        )
        .await
    }

    /// Like [`invoke`](Self::invoke), under a caller-supplied deadline.
    pub async fn invoke_within(
        &self,
        caller: Deadline,
        key: &str,
        request: AgentRequest,
    ) -> Result<AgentReply, InvokeError> {
        let agent = key
            .parse::<AgentKey>()
            .map_err(|_| InvokeError::UnknownBackend(key.to_string()))?;

        let (url, breaker) = match (self.registry.get(agent), self.breakers.get(&agent)) {
            (Some(descriptor), Some(breaker)) if descriptor.enabled => {
                match descriptor.url.as_ref() {
                    Some(url) => (url, breaker),
                    None => return Err(InvokeError::BackendDisabled(agent)),
                }
            }
            (Some(_), Some(_)) => {
                tracing::debug!(agent = %agent, "Agent disabled, not calling");
                return Err(InvokeError::BackendDisabled(agent));
            }
            _ => return Err(InvokeError::UnknownBackend(key.to_string())),
        };

        let deadline = caller.narrowed(self.agent_timeout, DeadlineCause::AgentTimeout);
        let started = Instant::now();

        let result = breaker
            .execute(|| self.transport.call(agent, url, &request, &deadline))
            .await;

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                tracing::debug!(
                    agent = %agent,
                    session_id = request.session_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Agent replied"
                );
                metrics::record_invocation(agent, "ok", elapsed);
            }
            Err(e) => {
                tracing::warn!(
                    agent = %agent,
                    session_id = request.session_id,
                    kind = %e.kind(),
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Agent call failed"
                );
                metrics::record_invocation(agent, e.kind().as_str(), elapsed);
            }
        }

        result
    }
}
