//! `POST /api/agent/chat`.
//!
//! # Responsibilities
//! - Decode and validate the chat turn
//! - Resolve `config.modalidad` to an agent
//! - Forward the `config` object as the agent's context
//! - Turn invocation failures into the fallback reply
//!
//! # Design Decisions
//! - Validation failures are 400 with a `{"detail": ...}` body
//! - Agent failures are not HTTP errors: the caller gets 200 with a fallback
//!   reply so the conversation can continue

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::http::server::AppState;
use crate::routing::resolve_modality;

pub const FALLBACK_REPLY: &str = "No pude conectar con el agente. Intenta de nuevo en un momento.";

/// Inbound chat turn.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: i64,
    pub config: ChatConfig,
}

/// Bot configuration sent with every turn; forwarded to the agent as context.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub nombre_bot: String,
    pub id_empresa: i64,
    pub rol_bot: String,
    pub tipo_bot: String,
    pub objetivo_principal: String,
    pub modalidad: String,
    pub frase_saludo: String,
    pub frase_des: String,
    pub frase_esc: String,
    pub personalidad: String,
    pub correo_usuario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duracion_cita_minutos: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agendar_usuario: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agendar_sucursal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario_id: Option<i64>,
}

impl ChatConfig {
    /// Context map for the agent: every named field, optional ones only when set.
    pub fn to_context(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: i64,
    pub agent_used: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

pub async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return detail(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Body demasiado grande (máx. 512 KB)",
            );
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Failed to read chat body");
            return detail(StatusCode::BAD_REQUEST, "JSON inválido");
        }
    };

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Chat decode error");
            return detail(StatusCode::BAD_REQUEST, "JSON inválido");
        }
    };

    if request.message.is_empty() {
        return detail(
            StatusCode::BAD_REQUEST,
            "El campo 'message' no puede estar vacío",
        );
    }
    let Ok(session_id) = u64::try_from(request.session_id) else {
        return detail(
            StatusCode::BAD_REQUEST,
            "El campo 'session_id' debe ser un entero no negativo",
        );
    };
    if request.config.id_empresa <= 0 {
        return detail(
            StatusCode::BAD_REQUEST,
            "El campo 'config.id_empresa' debe ser un número mayor a 0",
        );
    }
    let Some(agent) = resolve_modality(&request.config.modalidad) else {
        tracing::info!(modalidad = %request.config.modalidad, "Unrecognized modality");
        return detail(
            StatusCode::BAD_REQUEST,
            "El campo 'config.modalidad' no corresponde a ningún agente",
        );
    };

    // Cancelled when the connection goes away and this future is dropped.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let result = state
        .invoker
        .invoke(
            &cancel,
            agent.as_str(),
            request.message,
            session_id,
            request.config.to_context(),
        )
        .await;

    let (reply, url) = match result {
        Ok(reply) => {
            tracing::info!(agent = %agent, session_id, "Chat ok");
            (reply.reply, reply.url)
        }
        Err(e) => {
            tracing::warn!(agent = %agent, session_id, kind = %e.kind(), "Agent invoke failed, sending fallback");
            (FALLBACK_REPLY.to_string(), None)
        }
    };

    Json(ChatResponse {
        reply,
        session_id: request.session_id,
        agent_used: Some(agent.as_str().to_string()),
        action: "delegate".to_string(),
        url,
    })
    .into_response()
}
