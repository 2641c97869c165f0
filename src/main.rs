//! Tenacity admin service.
//!
//! ```text
//!   config.toml ──▶ Tenacity::bootstrap ──▶ property store ◀── poller / overrides file
//!                                             │
//!                         registry ◀──────────┤
//!                         engine   ◀──────────┘
//!                            │
//!   admin client ──HTTP──▶ admin API (keys, configuration, circuit breakers)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tenacity::config::{load_config, TenacityConfig};
use tenacity::lifecycle::{shutdown_signal, Tenacity};
use tenacity::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "tenacity")]
#[command(about = "Dependency resilience configuration and circuit breaker admin service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "TENACITY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TenacityConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tenacity starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        dependencies = config.dependencies.len(),
        admin_enabled = config.admin.enabled,
        config_file = ?args.config,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let app = Tenacity::bootstrap(config)?;
    app.serve(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
