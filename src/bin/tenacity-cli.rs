use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use tenacity::circuit::ForceCommand;

#[derive(Parser)]
#[command(name = "tenacity-cli")]
#[command(about = "Admin CLI for a running tenacity service", long_about = None)]
struct Cli {
    /// Base URL including the admin prefix.
    #[arg(short, long, default_value = "http://localhost:8080/tenacity")]
    url: String,

    /// Admin API key, if the service requires one.
    #[arg(short, long, env = "TENACITY_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered dependency keys
    Keys,
    /// Show the resolved configuration of a dependency
    Config { key: String },
    /// List instantiated circuit breakers
    Breakers,
    /// Show one circuit breaker
    Breaker { key: String },
    /// Force a breaker: FORCED_OPEN, FORCED_CLOSED or FORCED_RESET
    Force { key: String, state: ForceCommand },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match &cli.command {
        Commands::Keys => client.get(format!("{}/propertykeys", base)),
        Commands::Config { key } => client.get(format!("{}/configuration/{}", base, key)),
        Commands::Breakers => client.get(format!("{}/circuitbreakers", base)),
        Commands::Breaker { key } => client.get(format!("{}/circuitbreakers/{}", base, key)),
        Commands::Force { key, state } => client
            .put(format!("{}/circuitbreakers/{}", base, key))
            .json(&json!({ "state": state })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
