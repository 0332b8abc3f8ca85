//! Shared utilities for integration tests.
//!
//! Mock agents are raw TCP servers speaking just enough HTTP/1.1, so tests
//! control exactly when (and whether) status line, headers and body are sent.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_gateway::config::GatewayConfig;
use agent_gateway::routing::AgentKey;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What a programmable backend does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Status code and body, sent with `Content-Type: application/json`.
    Json(u16, String),
    /// Close the connection without answering.
    Hangup,
    /// Accept the request and never answer.
    Silent,
    /// Send headers for a body that never arrives.
    StallBody,
}

impl Reply {
    pub fn ok(reply: &str) -> Self {
        Reply::Json(200, serde_json::json!({ "reply": reply }).to_string())
    }

    pub fn ok_with_url(reply: &str, url: &str) -> Self {
        Reply::Json(200, serde_json::json!({ "reply": reply, "url": url }).to_string())
    }
}

/// Counters a backend exposes to the test.
#[derive(Debug, Default)]
pub struct BackendStats {
    pub connections: AtomicUsize,
    pub requests: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl BackendStats {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub stats: Arc<BackendStats>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}/api/chat", self.addr)
    }
}

/// Start a programmable backend on an ephemeral port.
///
/// `f` receives the raw request body and decides the reply.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = Arc::new(BackendStats::default());
    let f = Arc::new(f);

    let shared = stats.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            shared.connections.fetch_add(1, Ordering::SeqCst);
            let f = f.clone();
            let stats = shared.clone();
            tokio::spawn(serve_connection(socket, f, stats));
        }
    });

    MockBackend { addr, stats }
}

/// Start a backend that always gives the same reply.
pub async fn start_mock_backend(reply: Reply) -> MockBackend {
    start_programmable_backend(move |_| {
        let reply = reply.clone();
        async move { reply }
    })
    .await
}

/// A URL nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/chat")
}

/// Default config with every agent disabled, fast breaker settings.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    for key in AgentKey::ALL {
        config.agents.get_mut(key).enabled = false;
    }
    config.circuit_breaker.cool_down_ms = 300;
    config
}

pub fn enable(config: &mut GatewayConfig, key: AgentKey, url: String) {
    let agent = config.agents.get_mut(key);
    agent.enabled = true;
    agent.url = url;
}

async fn serve_connection<F, Fut>(mut socket: TcpStream, f: Arc<F>, stats: Arc<BackendStats>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let Some(body) = read_request(&mut socket).await else {
        return;
    };
    stats.requests.fetch_add(1, Ordering::SeqCst);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.max_in_flight.fetch_max(now, Ordering::SeqCst);

    let reply = f(body).await;
    match reply {
        Reply::Json(status, body) => {
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::Hangup => drop(socket),
        Reply::Silent => {
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return;
        }
        Reply::StallBody => {
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"rep")
                .await;
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return;
        }
    }
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
}

/// Read one request; return its body.
pub async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    Some(String::from_utf8_lossy(&data[header_end..]).into_owned())
}

pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
