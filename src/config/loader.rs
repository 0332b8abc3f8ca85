//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::AgentKey;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {var}")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration for process startup.
///
/// Defaults, then the optional TOML file, then environment overrides. The
/// result is validated once; the gateway never reloads it.
pub fn load_startup_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the gateway's environment variables on top of `config`.
///
/// `lookup` abstracts the environment so overrides can be tested without
/// mutating process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| {
        lookup(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(port) = get("GATEWAY_HTTP_PORT") {
        let port: u16 = parse_env("GATEWAY_HTTP_PORT", &port)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(origins) = get("CORS_ALLOWED_ORIGINS") {
        config.listener.cors_origins = origins;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level.to_lowercase();
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.observability.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            _ => return Err(env_error("LOG_FORMAT", &format)),
        };
    }

    for (var, slot) in [
        (
            "GATEWAY_READ_HEADER_TIMEOUT_SEC",
            &mut config.server.read_header_secs,
        ),
        ("GATEWAY_READ_TIMEOUT_SEC", &mut config.server.read_secs),
        ("GATEWAY_WRITE_TIMEOUT_SEC", &mut config.server.write_secs),
        ("GATEWAY_IDLE_TIMEOUT_SEC", &mut config.server.idle_secs),
    ] {
        if let Some(value) = get(var) {
            *slot = parse_env(var, &value)?;
        }
    }

    if let Some(secs) = get("AGENT_TIMEOUT") {
        let secs: u64 = parse_env("AGENT_TIMEOUT", &secs)?;
        config.invocation.agent_timeout_ms = secs.saturating_mul(1000);
    }

    for key in AgentKey::ALL {
        let prefix = key.env_prefix();
        let agent = config.agents.get_mut(key);

        let url_var = format!("{}_URL", prefix);
        if let Some(url) = get(&url_var) {
            agent.url = url;
        }
        let enabled_var = format!("{}_ENABLED", prefix);
        if let Some(enabled) = get(&enabled_var) {
            agent.enabled = parse_bool(&enabled).ok_or_else(|| env_error(&enabled_var, &enabled))?;
        }
    }

    Ok(())
}

/// Parse the boolean spellings orchestration tools tend to send.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| env_error(var, value))
}

fn env_error(var: &str, value: &str) -> ConfigError {
    ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_overrides_agents_and_timeouts() {
        let vars = env(&[
            ("AGENT_CITA_URL", "http://citas:9000/api/chat"),
            ("AGENT_VENTA_ENABLED", "0"),
            ("AGENT_TIMEOUT", "20"),
            ("GATEWAY_HTTP_PORT", "9100"),
            ("GATEWAY_WRITE_TIMEOUT_SEC", "25"),
        ]);
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.agents.cita.url, "http://citas:9000/api/chat");
        assert!(!config.agents.venta.enabled);
        assert_eq!(config.invocation.agent_timeout_ms, 20_000);
        assert_eq!(config.listener.bind_address, "0.0.0.0:9100");
        assert_eq!(config.server.write_secs, 25);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let vars = env(&[("AGENT_RESERVA_URL", "  "), ("AGENT_RESERVA_ENABLED", "")]);
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.agents.reserva.url, "http://localhost:8003/api/chat");
        assert!(config.agents.reserva.enabled);
    }

    #[test]
    fn test_bad_boolean_is_rejected() {
        let vars = env(&[("AGENT_CITAS_VENTAS_ENABLED", "maybe")]);
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap_err();

        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "AGENT_CITAS_VENTAS_ENABLED"));
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn test_startup_config_reads_toml_file() {
        let path = std::env::temp_dir().join(format!("agent-gateway-{}.toml", std::process::id()));
        fs::write(
            &path,
            r#"
[circuit_breaker]
failure_threshold = 3

[agents.reserva]
enabled = false
"#,
        )
        .unwrap();

        let loaded = load_startup_config(Some(&path));
        let _ = fs::remove_file(&path);
        let config = loaded.unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert!(!config.agents.reserva.enabled);
        assert_eq!(config.server.shutdown_grace_secs, 10);
    }

    #[test]
    fn test_startup_config_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("agent-gateway-bad-{}.toml", std::process::id()));
        fs::write(&path, "[transport]\ndial_timeout_ms = 0\n").unwrap();

        let loaded = load_startup_config(Some(&path));
        let _ = fs::remove_file(&path);

        assert!(matches!(loaded, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_error_lists_all_problems() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingAgentUrl(AgentKey::Cita),
            ValidationError::ZeroTimeout("transport.dial_timeout_ms"),
        ]);
        let message = err.to_string();
        assert!(message.contains("agent 'cita'"));
        assert!(message.contains("dial_timeout_ms must be greater than zero"));
    }
}
