//! Agent wire format.
//!
//! ```text
//! POST <agent url>
//! {"message": "...", "session_id": 42, "context": {...}}
//!
//! 2xx
//! {"reply": "...", "url": "https://..."}     url optional, "" means none
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body sent to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    pub session_id: u64,
    /// Forwarded verbatim.
    pub context: Map<String, Value>,
}

impl AgentRequest {
    pub fn new(message: impl Into<String>, session_id: u64, context: Map<String, Value>) -> Self {
        Self {
            message: message.into(),
            session_id,
            context,
        }
    }
}

/// Body an agent answers with.
#[derive(Debug, Clone, Deserialize)]
struct AgentResponse {
    reply: String,
    #[serde(default)]
    url: Option<String>,
}

/// A successful agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentReply {
    pub reply: String,
    /// Follow-up link, absent when the agent sent none or an empty string.
    pub url: Option<String>,
}

impl From<AgentResponse> for AgentReply {
    fn from(response: AgentResponse) -> Self {
        Self {
            reply: response.reply,
            url: response.url.filter(|url| !url.trim().is_empty()),
        }
    }
}

pub fn encode_request(request: &AgentRequest) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(request)
}

pub fn decode_reply(body: &[u8]) -> Result<AgentReply, serde_json::Error> {
    serde_json::from_slice::<AgentResponse>(body).map(AgentReply::from)
}
