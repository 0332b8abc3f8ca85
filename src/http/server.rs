//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, timeouts, body limit)
//! - Bind server to listener and run until shutdown
//!
//! # Routes
//! ```text
//! POST /api/agent/chat   chat turn → agent
//! GET  /health           agent reachability
//! GET  /metrics          Prometheus exposition
//! GET  /                 service info
//! ```

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::health::HealthProber;
use crate::http::chat::chat_handler;
use crate::http::request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
use crate::invoke::AgentInvoker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub invoker: Arc<AgentInvoker>,
    pub prober: Arc<HealthProber>,
    /// `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    shutdown_grace: Duration,
}

impl HttpServer {
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
            shutdown_grace: config.server.shutdown_grace(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(cors_layer(&config.listener.cors_origins))
            .layer(TimeoutLayer::new(config.server.write_timeout()))
            .layer(RequestBodyTimeoutLayer::new(config.server.read_timeout()));

        Router::new()
            .route("/api/agent/chat", post(chat_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/", get(root_handler))
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .with_state(state)
            .layer(middleware)
    }

    /// Run the server until a shutdown signal arrives.
    ///
    /// Once shutdown starts, open connections get `shutdown_grace` to finish;
    /// whatever is still running after that is dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (draining_tx, draining_rx) = oneshot::channel();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
                let _ = draining_tx.send(());
            })
            .into_future();
        tokio::pin!(serve);

        let grace = self.shutdown_grace;
        let grace_expired = async move {
            match draining_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                Err(_) => std::future::pending().await,
            }
        };

        tokio::select! {
            result = &mut serve => result?,
            _ = grace_expired => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Shutdown grace period elapsed, dropping open connections"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `*` allows any origin without credentials; a list allows exactly those
/// origins with credentials.
fn cors_layer(origins: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let listed: Vec<&str> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();

    if listed.is_empty() || listed.contains(&"*") {
        return base.allow_origin(Any);
    }

    let values: Vec<HeaderValue> = listed
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(values))
        .allow_credentials(true)
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let report = state.prober.check_all().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "agent-gateway",
        "status": "running",
        "endpoints": {
            "/api/agent/chat": "POST",
            "/health": "GET",
            "/metrics": "GET",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_accepts_wildcard_and_lists() {
        // CorsLayer panics when layered with Any + credentials.
        for origins in ["*", "https://app.example.com, https://n8n.example.com", ""] {
            let _router: Router = Router::new()
                .route("/", get(root_handler))
                .layer(cors_layer(origins));
        }
    }
}
