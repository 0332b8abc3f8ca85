//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (breaker transition metrics)
//! - Bind the listener and log the startup banner
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::{BuildError, PrometheusHandle};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::util::TryInitError;

use crate::config::{ConfigError, GatewayConfig};
use crate::health::HealthProber;
use crate::http::{AppState, HttpServer};
use crate::invoke::AgentInvoker;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::routing::{AgentKey, BackendRegistry, MODALITY_TABLE};

/// Anything that stops the gateway from starting or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A fully wired gateway, not yet listening.
pub struct Gateway {
    config: GatewayConfig,
    invoker: Arc<AgentInvoker>,
    state: AppState,
}

impl Gateway {
    /// Build registry, invoker and health prober from a validated config.
    pub fn build(config: GatewayConfig, metrics: Option<PrometheusHandle>) -> Self {
        let registry = Arc::new(BackendRegistry::new(&config.agents, &config.health_check));
        let invoker = Arc::new(AgentInvoker::new(&config, registry.clone()));
        let prober = Arc::new(HealthProber::new(registry, &config.health_check));

        let state = AppState {
            invoker: invoker.clone(),
            prober,
            metrics,
        };

        Self {
            config,
            invoker,
            state,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn invoker(&self) -> &Arc<AgentInvoker> {
        &self.invoker
    }

    /// Bind the configured listener address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = &self.config.listener.bind_address;
        TcpListener::bind(address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), StartupError> {
        if self.state.metrics.is_some() {
            tokio::spawn(metrics::follow_transitions(
                self.invoker.subscribe_transitions(),
                shutdown.subscribe(),
            ));
        }

        let server = HttpServer::new(&self.config, self.state);
        server
            .run(listener, shutdown.subscribe())
            .await
            .map_err(StartupError::Serve)
    }
}

/// Log the startup banner.
pub fn log_banner(config: &GatewayConfig, address: SocketAddr) {
    let server = &config.server;
    tracing::info!(
        address = %address,
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.observability.log_level,
        cors_origins = %config.listener.cors_origins,
        "Starting agent gateway"
    );
    tracing::info!(
        read_header_secs = server.read_header_secs,
        read_secs = server.read_secs,
        write_secs = server.write_secs,
        idle_secs = server.idle_secs,
        agent_timeout_ms = config.invocation.agent_timeout_ms,
        response_header_timeout_ms = config.transport.response_header_timeout_ms,
        "Timeouts"
    );
    for key in AgentKey::ALL {
        let agent = config.agents.get(key);
        tracing::info!(
            agent = %key,
            label = key.label(),
            enabled = agent.enabled,
            url = %agent.url,
            "Agent"
        );
    }
    for (modality, key) in MODALITY_TABLE {
        tracing::info!(modality, agent = %key, "Modality route");
    }
    tracing::info!(
        endpoints = "POST /api/agent/chat, GET /health, GET /metrics, GET /",
        "Endpoints"
    );
}
