//! On-demand agent health probing.
//!
//! # Responsibilities
//! - Probe every enabled agent's health URL concurrently
//! - Classify each agent as ok, disabled or unreachable
//!
//! Probes use their own client and never touch circuit breakers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::health::state::{AgentHealth, HealthReport};
use crate::routing::{AgentKey, BackendRegistry};

pub struct HealthProber {
    registry: Arc<BackendRegistry>,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl HealthProber {
    pub fn new(registry: Arc<BackendRegistry>, config: &HealthCheckConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.timeout()));
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            registry,
            timeout: config.timeout(),
            client,
        }
    }

    /// Probe all agents and build the report.
    pub async fn check_all(&self) -> HealthReport {
        let probes = self.registry.all().map(|backend| async move {
            let health = if !backend.enabled {
                AgentHealth::Disabled
            } else {
                match backend.health_url(self.registry.health_path()) {
                    Some(url) => self.probe(backend.key, &url).await,
                    None => AgentHealth::Unreachable,
                }
            };
            (backend.key, health)
        });

        let agents: BTreeMap<AgentKey, AgentHealth> = join_all(probes).await.into_iter().collect();
        HealthReport::from_agents(agents)
    }

    async fn probe(&self, agent: AgentKey, url: &Url) -> AgentHealth {
        let request = match Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", "agent-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(agent = %agent, error = %e, "Failed to build health check request");
                return AgentHealth::Unreachable;
            }
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => AgentHealth::Ok,
            Ok(Ok(response)) => {
                tracing::warn!(agent = %agent, status = %response.status(), "Health check failed: non-success status");
                AgentHealth::Unreachable
            }
            Ok(Err(e)) => {
                tracing::warn!(agent = %agent, error = %e, "Health check failed: connection error");
                AgentHealth::Unreachable
            }
            Err(_) => {
                tracing::warn!(agent = %agent, "Health check failed: timeout");
                AgentHealth::Unreachable
            }
        }
    }
}
