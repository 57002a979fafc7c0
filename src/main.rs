//! Upgrade-aware reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing ──▶ upstream (plain HTTP)
//!                    │
//!                    │ upgrade handshake + 101 from upstream
//!                    ▼
//!              http::hijack ──▶ relay::engine ◀──▶ upstream connection
//!                                    │
//!                         capabilities (relay handler,
//!                         copy hook, close handler)
//! ```

use std::path::PathBuf;

use clap::Parser;

use upgrade_proxy::lifecycle::{startup, StartupOptions};

#[derive(Parser)]
#[command(name = "upgrade-proxy")]
#[command(about = "Reverse proxy that relays WebSocket and other upgraded connections", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    startup::run(StartupOptions {
        config_path: cli.config,
        bind: cli.bind,
    })
    .await?;
    Ok(())
}
