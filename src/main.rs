//! Station gate
//!
//! Session-gating reverse proxy in front of a static content server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ request id ──▶ trace ──▶ timeout ──▶ session gate ──┬──▶ /auth/* handlers
//!                                                        │           └──▶ upstream forward ──▶ content server
//!                                                        │
//!                                                        ├── identity provider (token refresh, user)
//!                                                        └── profile store (unlock flag)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use station_gate::config::{self, ConfigWatcher, GateConfig};
use station_gate::lifecycle::{spawn_signal_handler, Shutdown};
use station_gate::observability::{logging, metrics};
use station_gate::HttpServer;

#[derive(Parser, Debug, Clone)]
#[command(name = "station-gate")]
#[command(about = "Session gate in front of the station content server", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Identity provider base URL.
    #[arg(long, env = "SUPABASE_URL")]
    identity_url: Option<String>,

    /// Identity provider anonymous key.
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut GateConfig) {
        if let Some(url) = &self.identity_url {
            config.identity.url = url.clone();
        }
        if let Some(key) = &self.anon_key {
            config.identity.anon_key = key.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::read_config(path)?,
        None => GateConfig::default(),
    };
    cli.apply_overrides(&mut config);
    let config = config::validate(config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "station-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        identity_url = %config.identity.url,
        landing_path = %config.routes.landing_path,
        unlocked_path = %config.routes.unlocked_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Held for the lifetime of the server; dropping it stops the watch.
    let mut _watcher = None;
    let updates = match &cli.config {
        Some(path) => {
            let overrides = cli.clone();
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher
                .with_overrides(move |config| overrides.apply_overrides(config))
                .run()
            {
                Ok(handle) => _watcher = Some(handle),
                Err(e) => tracing::warn!(error = %e, "Config hot reload disabled"),
            }
            updates
        }
        None => tokio::sync::mpsc::unbounded_channel().1,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
