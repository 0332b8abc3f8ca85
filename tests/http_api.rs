//! End-to-end tests of the HTTP surface.

use std::net::SocketAddr;
use std::time::Duration;

use agent_gateway::config::GatewayConfig;
use agent_gateway::http::{ChatResponse, FALLBACK_REPLY};
use agent_gateway::lifecycle::{Gateway, Shutdown};
use agent_gateway::observability::metrics;
use agent_gateway::routing::AgentKey;
use common::Reply;
use serde_json::{json, Value};
use tokio::net::TcpListener;

mod common;

async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let handle = metrics::install_recorder().unwrap();
    let gateway = Gateway::build(config, Some(handle));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = gateway.serve(listener, &server_shutdown).await;
    });

    (addr, shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

fn chat_body(modalidad: &str) -> Value {
    json!({
        "message": "Quiero una cita",
        "session_id": 77,
        "config": {
            "nombre_bot": "Ana",
            "id_empresa": 5,
            "modalidad": modalidad,
            "slots": 2
        }
    })
}

#[tokio::test]
async fn test_chat_round_trip() {
    let cita = common::start_programmable_backend(|body| async move {
        let request: Value = serde_json::from_str(&body).unwrap_or_default();
        assert_eq!(request["session_id"], 77);
        assert_eq!(request["context"]["id_empresa"], 5);
        assert_eq!(request["context"]["slots"], 2);
        Reply::ok_with_url("Tu cita quedó agendada", "https://agenda.example/c/1")
    })
    .await;
    let mut config = common::test_config();
    common::enable(&mut config, AgentKey::Cita, cita.url());
    let (addr, shutdown) = start_gateway(config).await;

    let res = client()
        .post(format!("http://{addr}/api/agent/chat"))
        .json(&chat_body(" Citas "))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    let body: ChatResponse = res.json().await.unwrap();
    assert_eq!(body.reply, "Tu cita quedó agendada");
    assert_eq!(body.session_id, 77);
    assert_eq!(body.agent_used.as_deref(), Some("cita"));
    assert_eq!(body.action, "delegate");
    assert_eq!(body.url.as_deref(), Some("https://agenda.example/c/1"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_agent_failure_yields_fallback_reply() {
    let mut config = common::test_config();
    common::enable(&mut config, AgentKey::Venta, common::closed_port_url());
    let (addr, shutdown) = start_gateway(config).await;

    let res = client()
        .post(format!("http://{addr}/api/agent/chat"))
        .json(&chat_body("Ventas"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reply"], FALLBACK_REPLY);
    assert_eq!(body["agent_used"], "venta");
    assert_eq!(body["action"], "delegate");
    assert!(body.get("url").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let (addr, shutdown) = start_gateway(common::test_config()).await;
    let url = format!("http://{addr}/api/agent/chat");
    let client = client();

    let cases = [
        (json!({"message": "", "session_id": 1, "config": {"id_empresa": 1, "modalidad": "Citas"}}), "message"),
        (json!({"message": "hola", "session_id": -1, "config": {"id_empresa": 1, "modalidad": "Citas"}}), "session_id"),
        (json!({"message": "hola", "session_id": 1, "config": {"id_empresa": 0, "modalidad": "Citas"}}), "id_empresa"),
        (json!({"message": "hola", "session_id": 1, "config": {"id_empresa": 1, "modalidad": "Soporte"}}), "modalidad"),
    ];
    for (body, field) in cases {
        let res = client.post(&url).json(&body).send().await.unwrap();
        assert_eq!(res.status(), 400, "{field}");
        let detail: Value = res.json().await.unwrap();
        assert!(detail["detail"].as_str().unwrap().contains(field), "{detail}");
    }

    let res = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let (addr, shutdown) = start_gateway(common::test_config()).await;

    let huge = "x".repeat(600 * 1024);
    let res = client()
        .post(format!("http://{addr}/api/agent/chat"))
        .json(&json!({"message": huge, "session_id": 1, "config": {"id_empresa": 1, "modalidad": "Citas"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_reports_each_agent() {
    let healthy = common::start_mock_backend(Reply::Json(200, "{}".into())).await;
    let mut config = common::test_config();
    common::enable(&mut config, AgentKey::Venta, healthy.url());
    let (addr, shutdown) = start_gateway(config.clone()).await;

    let res = client().get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["agents"]["venta"], "ok");
    assert_eq!(body["agents"]["cita"], "disabled");
    shutdown.trigger();

    common::enable(&mut config, AgentKey::Cita, common::closed_port_url());
    let (addr, shutdown) = start_gateway(config).await;
    let res = client().get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["agents"]["cita"], "unreachable");
    shutdown.trigger();
}

#[tokio::test]
async fn test_root_and_metrics() {
    let (addr, shutdown) = start_gateway(common::test_config()).await;
    let client = client();

    let root: Value = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["status"], "running");
    assert_eq!(root["endpoints"]["/api/agent/chat"], "POST");

    let res = client.get(format!("http://{addr}/metrics")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let text = res.text().await.unwrap();
    assert!(text.contains("gateway_circuit_breaker_state"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_cors_preflight_with_wildcard() {
    let (addr, shutdown) = start_gateway(common::test_config()).await;

    let res = client()
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/api/agent/chat"))
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_grace_bounds_stuck_requests() {
    let silent = common::start_mock_backend(Reply::Silent).await;
    let mut config = common::test_config();
    config.server.shutdown_grace_secs = 1;
    common::enable(&mut config, AgentKey::Cita, silent.url());

    let gateway = Gateway::build(config, None);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move { gateway.serve(listener, &server_shutdown).await });

    let stuck = tokio::spawn(
        client()
            .post(format!("http://{addr}/api/agent/chat"))
            .json(&chat_body("Citas"))
            .send(),
    );
    tokio::time::timeout(Duration::from_secs(5), async {
        while silent.stats.requests() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    let started = std::time::Instant::now();
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server kept running past the grace period")
        .unwrap();

    assert!(result.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(900));
    stuck.abort();
}
