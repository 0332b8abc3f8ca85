//! Backend registry.
//!
//! # Responsibilities
//! - Hold one descriptor (URL + enabled flag) per agent key
//! - Answer routing lookups for the invocation layer
//! - Derive health-check URLs for the health collaborator
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Unknown keys resolve to "disabled, no URL", never to another agent

use std::collections::BTreeMap;

use url::Url;

use crate::config::{AgentsConfig, HealthCheckConfig};
use crate::routing::key::AgentKey;

/// A single backend agent as configured at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub key: AgentKey,
    /// Chat endpoint. `None` only for disabled agents without a usable URL.
    pub url: Option<Url>,
    pub enabled: bool,
}

impl BackendDescriptor {
    /// Same scheme/host/port as the target URL with `path` and no query.
    pub fn health_url(&self, path: &str) -> Option<Url> {
        let mut url = self.url.clone()?;
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        Some(url)
    }
}

/// Registry of every known backend.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<AgentKey, BackendDescriptor>,
    health_path: String,
}

impl BackendRegistry {
    /// Build the registry from validated agent configuration.
    pub fn new(agents: &AgentsConfig, health: &HealthCheckConfig) -> Self {
        let backends = AgentKey::ALL
            .into_iter()
            .map(|key| {
                let config = agents.get(key);
                let url = match Url::parse(&config.url) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        if config.enabled {
                            tracing::warn!(agent = %key, url = %config.url, error = %e, "Agent URL is not parseable");
                        }
                        None
                    }
                };
                (
                    key,
                    BackendDescriptor {
                        key,
                        url,
                        enabled: config.enabled,
                    },
                )
            })
            .collect();

        Self {
            backends,
            health_path: health.path.clone(),
        }
    }

    /// Descriptor for a known key.
    pub fn get(&self, key: AgentKey) -> Option<&BackendDescriptor> {
        self.backends.get(&key)
    }

    /// Descriptor for a raw routing key string.
    pub fn lookup(&self, key: &str) -> Option<&BackendDescriptor> {
        key.parse::<AgentKey>().ok().and_then(|key| self.get(key))
    }

    /// Whether `key` names an enabled agent. Unknown keys are disabled.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.lookup(key).map(|b| b.enabled).unwrap_or(false)
    }

    /// Target URL for `key`. Unknown keys have none.
    pub fn target_url(&self, key: &str) -> Option<&Url> {
        self.lookup(key).and_then(|b| b.url.as_ref())
    }

    /// Health-check URL for `key`.
    pub fn health_url(&self, key: &str) -> Option<Url> {
        self.lookup(key)
            .and_then(|b| b.health_url(&self.health_path))
    }

    /// Path appended to each agent's origin for health checks.
    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    /// All descriptors in key order.
    pub fn all(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.values()
    }
}
