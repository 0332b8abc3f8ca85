//! Agent gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                    AGENT GATEWAY                      │
//!                        │                                                       │
//!   POST /api/agent/chat │  ┌─────────┐   ┌──────────┐   ┌────────────────────┐  │
//!   ─────────────────────┼─▶│  http   │──▶│ routing  │──▶│ invoke (façade)    │  │
//!                        │  │  chat   │   │ modality │   │  deadline          │  │
//!                        │  └─────────┘   └──────────┘   │  circuit breaker   │  │
//!                        │                               │  pooled transport  │──┼──▶ agent
//!   reply / fallback     │  ┌─────────┐                  └────────────────────┘  │
//!   ◀────────────────────┼──│  http   │◀─────────────────────────────┘            │
//!                        │  └─────────┘                                          │
//!                        │  ┌──────────────────────────────────────────────────┐ │
//!                        │  │ config · health · observability · lifecycle      │ │
//!                        │  └──────────────────────────────────────────────────┘ │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use agent_gateway::config::load_startup_config;
use agent_gateway::lifecycle::{log_banner, spawn_signal_listener, Gateway, Shutdown, StartupError};
use agent_gateway::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "agent-gateway")]
#[command(about = "Routes chat turns to backend agents", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_startup_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("agent-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            eprintln!("agent-gateway: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: agent_gateway::GatewayConfig) -> Result<(), StartupError> {
    init_logging(&config.observability)?;

    let handle = if config.observability.metrics_enabled {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let gateway = Gateway::build(config, handle);
    let listener = gateway.bind().await?;
    let address = listener.local_addr().map_err(StartupError::Serve)?;
    log_banner(gateway.config(), address);

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    gateway.serve(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
