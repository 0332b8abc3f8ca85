//! Pooled connections survive failed replies.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_gateway::config::TransportConfig;
use agent_gateway::invoke::{AgentRequest, AgentTransport, FailureKind};
use agent_gateway::resilience::Deadline;
use agent_gateway::routing::AgentKey;
use serde_json::Map;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

mod common;

/// Keep-alive agent: odd requests get a 503 with a body, even ones a reply.
async fn start_keep_alive_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));

    let opened = connections.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            opened.fetch_add(1, Ordering::SeqCst);
            let served = served.clone();
            tokio::spawn(async move {
                while common::read_request(&mut socket).await.is_some() {
                    let n = served.fetch_add(1, Ordering::SeqCst);
                    let (status, body) = if n % 2 == 0 {
                        (503, format!("{{\"detail\": \"{}\"}}", "ocupado ".repeat(256)))
                    } else {
                        (200, r#"{"reply": "ok"}"#.to_string())
                    };
                    let response = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                        status,
                        common::reason(status),
                        body.len(),
                        body
                    );
                    if socket.write_all(response.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (addr, connections)
}

#[tokio::test]
async fn test_failed_reply_is_drained_and_connection_reused() {
    let (addr, connections) = start_keep_alive_backend().await;
    let transport = AgentTransport::new(&TransportConfig::default());
    let url = Url::parse(&format!("http://{addr}/api/chat")).unwrap();
    let request = AgentRequest::new("hola", 1, Map::new());

    for round in 0..3 {
        let deadline = Deadline::for_call(&CancellationToken::new(), Duration::from_secs(5));
        let err = transport
            .call(AgentKey::Venta, &url, &request, &deadline)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::BadStatus, "round {round}");

        let deadline = Deadline::for_call(&CancellationToken::new(), Duration::from_secs(5));
        let reply = transport
            .call(AgentKey::Venta, &url, &request, &deadline)
            .await
            .unwrap();
        assert_eq!(reply.reply, "ok", "round {round}");
    }

    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(transport.active_on(&url), 0);
}
