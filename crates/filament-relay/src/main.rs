//! # filament-relay
//!
//! Filament relay binary: loads settings, initializes logging and metrics,
//! and runs the WebSocket relay until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use filament_server::config::ServerConfig;
use filament_server::server::RelayServer;
use filament_settings::RelaySettings;

/// How long to wait for open sessions to say goodbye on shutdown.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Filament WebSocket relay.
#[derive(Parser, Debug)]
#[command(name = "filament-relay", about = "Filament WebSocket relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.filament/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Load settings from file and environment, then apply flags on top.
    fn resolve_settings(&self) -> Result<RelaySettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(filament_settings::settings_path);
        let mut settings = filament_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;
    logging::init(&settings.logging);

    let mut server = RelayServer::new(ServerConfig::from(&settings.server));
    if settings.server.metrics_enabled {
        let handle = filament_server::metrics::install_recorder()
            .context("Failed to install metrics recorder")?;
        server = server.with_metrics(handle);
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("filament relay listening on ws://{addr}");

    shutdown_signal().await?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    drain_sessions(&server).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

/// Give cancelled sessions a moment to send their close frames.
async fn drain_sessions(server: &RelayServer) {
    let drained = tokio::time::timeout(SESSION_DRAIN_TIMEOUT, async {
        while server.registry().connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            remaining = server.registry().connection_count(),
            "sessions still open at exit"
        );
    }
}
