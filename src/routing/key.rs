//! Routing keys and modality resolution.
//!
//! # Responsibilities
//! - Name the fixed set of backend agents
//! - Parse canonical key strings ("venta", "cita", ...)
//! - Map the business "modalidad" field to a key
//!
//! # Design Decisions
//! - Closed enum: every key the gateway can route to is known at compile time
//! - Unrecognized modalities resolve to nothing, never to a default agent

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical identifier of one backend agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKey {
    Venta,
    Cita,
    Reserva,
    CitasVentas,
}

impl AgentKey {
    /// Every agent, in banner/health-report order.
    pub const ALL: [AgentKey; 4] = [
        AgentKey::Venta,
        AgentKey::Cita,
        AgentKey::Reserva,
        AgentKey::CitasVentas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKey::Venta => "venta",
            AgentKey::Cita => "cita",
            AgentKey::Reserva => "reserva",
            AgentKey::CitasVentas => "citas_ventas",
        }
    }

    /// Human label used in the startup banner.
    pub fn label(&self) -> &'static str {
        match self {
            AgentKey::Venta => "Ventas",
            AgentKey::Cita => "Citas",
            AgentKey::Reserva => "Reservas",
            AgentKey::CitasVentas => "Citas y Ventas",
        }
    }

    /// Prefix of this agent's environment variables, e.g. `AGENT_CITAS_VENTAS`.
    pub fn env_prefix(&self) -> String {
        format!("AGENT_{}", self.as_str().to_uppercase())
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the canonical keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAgentKey(pub String);

impl fmt::Display for UnknownAgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown agent key '{}'", self.0)
    }
}

impl std::error::Error for UnknownAgentKey {}

impl FromStr for AgentKey {
    type Err = UnknownAgentKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownAgentKey(s.to_string()))
    }
}

/// Modality values and the agent each one routes to. Compared after trimming
/// and lowercasing.
pub const MODALITY_TABLE: [(&str, AgentKey); 4] = [
    ("citas", AgentKey::Cita),
    ("ventas", AgentKey::Venta),
    ("reservas", AgentKey::Reserva),
    ("citas y ventas", AgentKey::CitasVentas),
];

/// Resolve a business modality to its agent.
pub fn resolve_modality(modality: &str) -> Option<AgentKey> {
    let normalized = modality.trim().to_lowercase();
    MODALITY_TABLE
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, key)| *key)
}
