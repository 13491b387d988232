//! relayd — JSON-RPC-over-SSE relay server daemon.
//!
//! Serves the directory demo handler over the SSE transport. Runs until
//! interrupted, then drains sessions and exits.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_directory::DirectoryHandler;
use relay_rpc::JsonRpcNotification;
use relay_server::{ServerConfig, SseServer};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "relayd", about = "JSON-RPC-over-SSE relay server", version)]
struct Args {
    /// Path to a JSON config file.
    #[arg(long, default_value = "relay.json")]
    config: PathBuf,

    /// Override the configured bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Broadcast a timestamped heartbeat notification every N seconds
    /// (0 disables).
    #[arg(long, default_value_t = 0)]
    heartbeat_secs: u64,
}

impl Args {
    fn resolve_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::load_from_path(&self.config)
            .with_context(|| format!("loading config from {}", self.config.display()))?;
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn spawn_heartbeat(server: &Arc<SseServer>, interval_secs: u64) {
    let server = Arc::clone(server);
    let _handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            let _ = ticker.tick().await;
            let note = JsonRpcNotification::new(
                "notifications/heartbeat",
                Some(json!({ "time": chrono::Utc::now().to_rfc3339() })),
            );
            let delivered = server.notify_clients(&note.into());
            tracing::debug!(delivered, "heartbeat broadcast");
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = args.resolve_config()?;
    let server = Arc::new(SseServer::new(
        config,
        Arc::new(DirectoryHandler::default()),
    ));

    let (addr, serve_task) = server.listen().await.context("starting server")?;
    info!(%addr, "relayd listening");

    if args.heartbeat_secs > 0 {
        spawn_heartbeat(&server, args.heartbeat_secs);
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("interrupt received, shutting down");

    server.close_gracefully().await;
    serve_task.await.context("joining serve task")?;
    Ok(())
}
