//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus recorder once per process
//! - Define gateway metrics and the helpers that update them
//! - Follow breaker transitions into counters and a state gauge
//!
//! # Metrics
//! - `gateway_requests_total` (counter): agent calls by agent, status
//! - `gateway_request_duration_seconds` (histogram): agent call latency by agent
//! - `gateway_circuit_breaker_transitions_total` (counter): by agent, from, to
//! - `gateway_circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Helpers are free functions over the `metrics` facade; without an
//!   installed recorder they are no-ops, which keeps unit tests quiet
//! - `status` is `ok` or a failure kind label, never free text

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::sync::broadcast;

use crate::resilience::{CircuitState, StateChange};
use crate::routing::AgentKey;

static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Install the global Prometheus recorder, or return the one already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let mut handle = HANDLE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = handle.as_ref() {
        return Ok(existing.clone());
    }

    let installed = PrometheusBuilder::new().install_recorder()?;
    for agent in AgentKey::ALL {
        set_breaker_state(agent, CircuitState::Closed);
    }
    *handle = Some(installed.clone());
    Ok(installed)
}

/// Record one finished agent call.
pub fn record_invocation(agent: AgentKey, status: &'static str, elapsed: Duration) {
    metrics::counter!("gateway_requests_total", "agent" => agent.as_str(), "status" => status)
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "agent" => agent.as_str())
        .record(elapsed.as_secs_f64());
}

/// Record one breaker transition.
pub fn record_transition(change: &StateChange) {
    metrics::counter!(
        "gateway_circuit_breaker_transitions_total",
        "agent" => change.agent.as_str(),
        "from" => change.from.as_str(),
        "to" => change.to.as_str()
    )
    .increment(1);
    set_breaker_state(change.agent, change.to);
}

fn set_breaker_state(agent: AgentKey, state: CircuitState) {
    metrics::gauge!("gateway_circuit_breaker_state", "agent" => agent.as_str())
        .set(state_value(state));
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

/// Feed breaker transitions into metrics until shutdown or the channel closes.
pub async fn follow_transitions(
    mut transitions: broadcast::Receiver<StateChange>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            received = transitions.recv() => match received {
                Ok(change) => record_transition(&change),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Breaker transition metrics lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
