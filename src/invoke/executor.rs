//! HTTP invocation executor.
//!
//! # Responsibilities
//! - Own the single pooled transport shared by every agent
//! - Cap simultaneously active requests per agent host
//! - Perform one POST under a derived deadline and classify the outcome
//! - Drain failed responses so their connections can be reused
//!
//! # Design Decisions
//! - hyper-util's pooled client handles keep-alive and idle expiry; the
//!   per-host cap is a semaphore because the pool does not limit active
//!   connections
//! - The response-header wait runs under a narrowed deadline; the body read
//!   runs under the full call deadline
//! - Waiting for a host slot counts against the call deadline

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::TransportConfig;
use crate::invoke::error::{describe, InvokeError};
use crate::invoke::wire::{decode_reply, encode_request, AgentReply, AgentRequest};
use crate::resilience::{Deadline, DeadlineCause};
use crate::routing::AgentKey;

/// Shared HTTP transport for agent calls.
#[derive(Debug)]
pub struct AgentTransport {
    client: Client<HttpConnector, Body>,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
    max_connections_per_host: usize,
    response_header_timeout: Duration,
    max_response_bytes: usize,
    max_drain_bytes: usize,
}

impl AgentTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.dial_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.idle_connection_timeout())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self {
            client,
            hosts: Mutex::new(HashMap::new()),
            max_connections_per_host: config.max_connections_per_host.max(1),
            response_header_timeout: config.response_header_timeout(),
            max_response_bytes: config.max_response_bytes,
            max_drain_bytes: config.max_drain_bytes,
        }
    }

    /// POST `request` to `url` and decode the agent's reply.
    pub async fn call(
        &self,
        agent: AgentKey,
        url: &Url,
        request: &AgentRequest,
        deadline: &Deadline,
    ) -> Result<AgentReply, InvokeError> {
        let body = encode_request(request).map_err(|e| InvokeError::Transport {
            agent,
            connect: false,
            message: format!("encoding request: {e}"),
        })?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(url.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(Body::from(body))
            .map_err(|e| InvokeError::Transport {
                agent,
                connect: false,
                message: format!("building request: {e}"),
            })?;

        let _permit = self.acquire_host_slot(agent, url, deadline).await?;

        let headers_deadline =
            deadline.narrowed(self.response_header_timeout, DeadlineCause::ResponseHeaders);
        let response = match headers_deadline.run(self.client.request(http_request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(InvokeError::Transport {
                    agent,
                    connect: e.is_connect(),
                    message: describe(&e),
                })
            }
            Err(cause) => return Err(InvokeError::DeadlineExceeded { agent, cause }),
        };

        let status = response.status();
        if !status.is_success() {
            self.drain(agent, response.into_body(), deadline).await;
            return Err(InvokeError::BadStatus {
                agent,
                status: status.as_u16(),
            });
        }

        let body = Body::new(response.into_body());
        let bytes = match deadline
            .run(axum::body::to_bytes(body, self.max_response_bytes))
            .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                return Err(InvokeError::Transport {
                    agent,
                    connect: false,
                    message: format!("reading reply: {}", describe(&e)),
                })
            }
            Err(cause) => return Err(InvokeError::DeadlineExceeded { agent, cause }),
        };

        decode_reply(&bytes).map_err(|e| InvokeError::Decode {
            agent,
            message: e.to_string(),
        })
    }

    /// Active requests currently held against `url`'s host.
    pub fn active_on(&self, url: &Url) -> usize {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts
            .get(&host_key(url))
            .map(|s| self.max_connections_per_host - s.available_permits())
            .unwrap_or(0)
    }

    async fn acquire_host_slot(
        &self,
        agent: AgentKey,
        url: &Url,
        deadline: &Deadline,
    ) -> Result<OwnedSemaphorePermit, InvokeError> {
        let semaphore = {
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            hosts
                .entry(host_key(url))
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_connections_per_host)))
                .clone()
        };

        if let Ok(permit) = semaphore.clone().try_acquire_owned() {
            return Ok(permit);
        }

        tracing::debug!(agent = %agent, host = %host_key(url), "Waiting for a host connection slot");
        match deadline.run(semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(InvokeError::Transport {
                agent,
                connect: true,
                message: "host connection limiter closed".to_string(),
            }),
            Err(cause) => Err(InvokeError::DeadlineExceeded { agent, cause }),
        }
    }

    /// Read and discard up to `max_drain_bytes` so the connection can be pooled.
    async fn drain(&self, agent: AgentKey, body: Incoming, deadline: &Deadline) {
        let drained = deadline
            .run(axum::body::to_bytes(Body::new(body), self.max_drain_bytes))
            .await;
        if !matches!(drained, Ok(Ok(_))) {
            tracing::debug!(agent = %agent, "Failed response body not fully drained");
        }
    }
}

fn host_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
