//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::AgentKey;

/// Root configuration for the agent gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, CORS).
    pub listener: ListenerConfig,

    /// Inbound HTTP server timeouts.
    pub server: ServerTimeoutConfig,

    /// Backend agent endpoints, one per routing key.
    pub agents: AgentsConfig,

    /// Per-call invocation deadline.
    pub invocation: InvocationConfig,

    /// Shared outbound transport (connection pool) settings.
    pub transport: TransportConfig,

    /// Per-agent circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Allowed CORS origins, comma separated. `*` allows any origin.
    pub cors_origins: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            cors_origins: "*".to_string(),
            max_body_bytes: 512 * 1024,
        }
    }
}

/// Inbound server timeouts in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerTimeoutConfig {
    /// Max time to read request headers.
    pub read_header_secs: u64,

    /// Max time to read the full request.
    pub read_secs: u64,

    /// Max time to produce and write the response.
    pub write_secs: u64,

    /// Max idle time between keep-alive requests.
    pub idle_secs: u64,

    /// Max time open connections get to finish once shutdown starts.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerTimeoutConfig {
    fn default() -> Self {
        Self {
            read_header_secs: 10,
            read_secs: 40,
            write_secs: 35,
            idle_secs: 60,
            shutdown_grace_secs: 10,
        }
    }
}

impl ServerTimeoutConfig {
    pub fn read_header_timeout(&self) -> Duration {
        Duration::from_secs(self.read_header_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// A single backend agent endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat endpoint URL (POST).
    pub url: String,

    /// Whether the gateway forwards traffic to this agent.
    pub enabled: bool,
}

impl AgentConfig {
    fn local(port: u16) -> Self {
        Self {
            url: format!("http://localhost:{}/api/chat", port),
            enabled: true,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            enabled: true,
        }
    }
}

/// Endpoints for the fixed set of agents.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub venta: AgentConfig,
    pub cita: AgentConfig,
    pub reserva: AgentConfig,
    pub citas_ventas: AgentConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            venta: AgentConfig::local(8001),
            cita: AgentConfig::local(8002),
            reserva: AgentConfig::local(8003),
            citas_ventas: AgentConfig::local(8004),
        }
    }
}

impl AgentsConfig {
    pub fn get(&self, key: AgentKey) -> &AgentConfig {
        match key {
            AgentKey::Venta => &self.venta,
            AgentKey::Cita => &self.cita,
            AgentKey::Reserva => &self.reserva,
            AgentKey::CitasVentas => &self.citas_ventas,
        }
    }

    pub fn get_mut(&mut self, key: AgentKey) -> &mut AgentConfig {
        match key {
            AgentKey::Venta => &mut self.venta,
            AgentKey::Cita => &mut self.cita,
            AgentKey::Reserva => &mut self.reserva,
            AgentKey::CitasVentas => &mut self.citas_ventas,
        }
    }
}

/// Per-call deadline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// End-to-end budget for one agent call in milliseconds.
    pub agent_timeout_ms: u64,

    /// Headroom kept between the agent timeout and the server write timeout.
    pub safety_margin_ms: u64,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 30_000,
            safety_margin_ms: 2_000,
        }
    }
}

impl InvocationConfig {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_millis(self.safety_margin_ms)
    }
}

/// Shared outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in milliseconds.
    pub dial_timeout_ms: u64,

    /// Max wait for the response status line and headers, in milliseconds.
    pub response_header_timeout_ms: u64,

    /// Idle connections kept across all agent hosts.
    pub max_idle_connections: usize,

    /// Idle connections kept per agent host.
    pub max_idle_per_host: usize,

    /// Hard cap on simultaneously active connections per agent host.
    pub max_connections_per_host: usize,

    /// Idle pooled connections are closed after this many seconds.
    pub idle_connection_secs: u64,

    /// Largest success body the gateway will decode.
    pub max_response_bytes: usize,

    /// Largest failure body drained before a connection is reused.
    pub max_drain_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: 5_000,
            response_header_timeout_ms: 20_000,
            max_idle_connections: 50,
            max_idle_per_host: 10,
            max_connections_per_host: 32,
            idle_connection_secs: 90,
            max_response_bytes: 1024 * 1024,
            max_drain_bytes: 64 * 1024,
        }
    }
}

impl TransportConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.response_header_timeout_ms)
    }

    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_secs)
    }
}

/// Circuit breaker configuration, applied to every agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before probing, in milliseconds.
    pub cool_down_ms: u64,

    /// Probes allowed concurrently while half-open.
    pub half_open_max_requests: u32,

    /// Closed-state counters are cleared this often (0 = never), in milliseconds.
    pub interval_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down_ms: 60_000,
            half_open_max_requests: 3,
            interval_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }

    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Per-agent probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path probed on each agent host.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            path: "/health".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [agents.venta]
            url = "http://ventas.internal:9000/api/chat"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.agents.venta.url, "http://ventas.internal:9000/api/chat");
        assert!(!config.agents.venta.enabled);
        assert_eq!(config.agents.cita.url, "http://localhost:8002/api/chat");
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.invocation.agent_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_interval_disables_window() {
        let cb = CircuitBreakerConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(cb.interval().is_none());
    }
}
