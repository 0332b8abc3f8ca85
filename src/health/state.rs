//! Health report types.
//!
//! # States
//! - Ok: the agent's health URL answered 2xx within the probe timeout
//! - Disabled: switched off in configuration, not probed
//! - Unreachable: connection error, timeout, non-2xx or no URL
//!
//! # Overall status
//! ```text
//! every enabled agent Ok  → "ok"        (200)
//! otherwise               → "degraded"  (503)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::AgentKey;

/// Probe result for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    Ok,
    Disabled,
    Unreachable,
}

/// Aggregate gateway health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Ok,
    Degraded,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallHealth,
    pub service: String,
    pub agents: BTreeMap<AgentKey, AgentHealth>,
}

impl HealthReport {
    pub fn from_agents(agents: BTreeMap<AgentKey, AgentHealth>) -> Self {
        let status = if agents.values().any(|h| *h == AgentHealth::Unreachable) {
            OverallHealth::Degraded
        } else {
            OverallHealth::Ok
        };
        Self {
            status,
            service: "gateway".to_string(),
            agents,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OverallHealth::Ok
    }
}
