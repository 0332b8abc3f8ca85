//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce the timeout ordering every call deadline relies on
//! - Check that each enabled agent has a usable endpoint
//! - Validate value ranges (thresholds, pool bounds)
//!
//! # Timeout ordering
//! ```text
//! agent_timeout + safety_margin < write_timeout < read_timeout <= idle_timeout
//! dial_timeout < response_header_timeout < agent_timeout
//! ```
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::AgentKey;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two timeouts violate the required ordering.
    #[error("{smaller} ({smaller_value:?}) must be {relation} {larger} ({larger_value:?})")]
    TimeoutOrder {
        smaller: &'static str,
        smaller_value: Duration,
        relation: &'static str,
        larger: &'static str,
        larger_value: Duration,
    },

    /// A timeout that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    /// An enabled agent has no URL.
    #[error("agent '{0}' is enabled but has no URL")]
    MissingAgentUrl(AgentKey),

    /// An agent URL could not be parsed or is not plain http.
    #[error("agent '{agent}' has an invalid URL '{url}': {reason}")]
    InvalidAgentUrl {
        agent: AgentKey,
        url: String,
        reason: String,
    },

    /// A numeric setting is outside its allowed range.
    #[error("{field} is {value}, must be at least {min}")]
    TooSmall {
        field: &'static str,
        value: u64,
        min: u64,
    },

    /// Per-host idle bound times distinct hosts exceeds the total idle bound.
    #[error(
        "max_idle_per_host ({per_host}) x {hosts} agent hosts exceeds max_idle_connections ({total})"
    )]
    IdleBudget {
        per_host: usize,
        hosts: usize,
        total: usize,
    },

    /// The listener address is not a socket address.
    #[error("listener bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_timeouts(config, &mut errors);
    validate_agents(config, &mut errors);
    validate_limits(config, &mut errors);

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_timeouts(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let dial = config.transport.dial_timeout();
    let header = config.transport.response_header_timeout();
    let agent = config.invocation.agent_timeout();
    let agent_with_margin = agent + config.invocation.safety_margin();
    let write = config.server.write_timeout();
    let read = config.server.read_timeout();
    let idle = config.server.idle_timeout();

    for (name, value) in [
        ("transport.dial_timeout_ms", dial),
        ("transport.response_header_timeout_ms", header),
        ("invocation.agent_timeout_ms", agent),
        ("server.read_header_secs", config.server.read_header_timeout()),
        ("health_check.timeout_ms", config.health_check.timeout()),
    ] {
        if value.is_zero() {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    let mut less_than = |smaller: &'static str,
                         smaller_value: Duration,
                         larger: &'static str,
                         larger_value: Duration,
                         allow_equal: bool| {
        let ok = if allow_equal {
            smaller_value <= larger_value
        } else {
            smaller_value < larger_value
        };
        if !ok {
            errors.push(ValidationError::TimeoutOrder {
                smaller,
                smaller_value,
                relation: if allow_equal { "at most" } else { "less than" },
                larger,
                larger_value,
            });
        }
    };

    less_than(
        "invocation.agent_timeout_ms + safety_margin_ms",
        agent_with_margin,
        "server.write_secs",
        write,
        false,
    );
    less_than("server.write_secs", write, "server.read_secs", read, false);
    less_than("server.read_secs", read, "server.idle_secs", idle, true);
    less_than(
        "transport.dial_timeout_ms",
        dial,
        "transport.response_header_timeout_ms",
        header,
        false,
    );
    less_than(
        "transport.response_header_timeout_ms",
        header,
        "invocation.agent_timeout_ms",
        agent,
        false,
    );
}

fn validate_agents(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut hosts = HashSet::new();

    for key in AgentKey::ALL {
        let agent = config.agents.get(key);
        if !agent.enabled {
            continue;
        }
        if agent.url.trim().is_empty() {
            errors.push(ValidationError::MissingAgentUrl(key));
            continue;
        }
        match Url::parse(&agent.url) {
            Ok(url) if url.scheme() == "http" && url.host().is_some() => {
                hosts.insert((
                    url.scheme().to_string(),
                    url.host_str().unwrap_or_default().to_string(),
                    url.port_or_known_default(),
                ));
            }
            Ok(url) => errors.push(ValidationError::InvalidAgentUrl {
                agent: key,
                url: agent.url.clone(),
                reason: format!("scheme '{}' is not http or host is missing", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidAgentUrl {
                agent: key,
                url: agent.url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    let transport = &config.transport;
    if !hosts.is_empty()
        && transport.max_idle_per_host.saturating_mul(hosts.len()) > transport.max_idle_connections
    {
        errors.push(ValidationError::IdleBudget {
            per_host: transport.max_idle_per_host,
            hosts: hosts.len(),
            total: transport.max_idle_connections,
        });
    }
}

fn validate_limits(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let cb = &config.circuit_breaker;
    let transport = &config.transport;

    for (field, value) in [
        ("circuit_breaker.failure_threshold", cb.failure_threshold as u64),
        (
            "circuit_breaker.half_open_max_requests",
            cb.half_open_max_requests as u64,
        ),
        ("circuit_breaker.cool_down_ms", cb.cool_down_ms),
        (
            "transport.max_connections_per_host",
            transport.max_connections_per_host as u64,
        ),
        ("transport.max_idle_connections", transport.max_idle_connections as u64),
        ("transport.max_response_bytes", transport.max_response_bytes as u64),
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
    ] {
        if value < 1 {
            errors.push(ValidationError::TooSmall {
                field,
                value,
                min: 1,
            });
        }
    }
}
