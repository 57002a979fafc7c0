//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics in dependency order
//! - Start the config watcher
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::validation::validate_config;
use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, ConfigError, ProxyConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::{logging, metrics};

/// Options collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// TOML file to load and watch. Defaults apply when absent.
    pub config_path: Option<PathBuf>,
    /// Overrides `listener.bind_address`.
    pub bind: Option<String>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("Failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("Failed to watch config file: {0}")]
    Watcher(#[from] notify::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Resolve the effective configuration from `options`.
pub fn resolve_config(options: &StartupOptions) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &options.bind {
        config.listener.bind_address = bind.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }
    Ok(config)
}

/// Run the proxy until a termination signal arrives.
pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    // 1. Configuration
    let config = resolve_config(&options)?;

    // 2. Logging
    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upgrade-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        forward_proxy = config.forward_proxy,
        relay_enabled = config.relay.enabled,
        relay_mode = ?config.relay.mode,
        "Configuration loaded"
    );

    // 3. Metrics
    if config.observability.metrics_enabled {
        // Address was checked by validation.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr)?;
        }
    }

    // 4. Hot reload
    let (_watcher, config_updates) = match &options.config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    // 5. Shutdown wiring
    let shutdown = Shutdown::new();
    let signal_task = shutdown.trigger_on_signal();

    // 6. Listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(config)
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    signal_task.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}
