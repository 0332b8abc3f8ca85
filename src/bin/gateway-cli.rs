use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for a running agent gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway and per-agent health
    Health,
    /// Send one chat turn through the gateway
    Chat {
        /// Message text
        message: String,
        /// Business modality (Citas, Ventas, Reservas, "Citas y Ventas")
        #[arg(short, long, default_value = "Citas")]
        modalidad: String,
        #[arg(short, long, default_value_t = 1)]
        session_id: i64,
        #[arg(short = 'e', long, default_value_t = 1)]
        id_empresa: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Chat {
            message,
            modalidad,
            session_id,
            id_empresa,
        } => {
            let body = json!({
                "message": message,
                "session_id": session_id,
                "config": {
                    "id_empresa": id_empresa,
                    "modalidad": modalidad,
                }
            });
            let res = client
                .post(format!("{base}/api/agent/chat"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Gateway returned status {status}");
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
