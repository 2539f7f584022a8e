//! Run command: the long-running update loop.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::Session;
use crate::alerts::{Alert, Notifier};
use crate::health;
use crate::signal::spawn_signal_handler;

/// Run update cycles until SIGINT or SIGTERM.
pub async fn run(config_path: &Path) -> Result<()> {
    let session = Session::prepare(config_path)?;

    let listen: SocketAddr = session
        .config
        .health
        .listen
        .parse()
        .with_context(|| format!("Invalid health listen address: {}", session.config.health.listen))?;
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind health server on {}", listen))?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let server = {
        let state = Arc::clone(&session.health);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve_listener(listener, state, cancel.clone()).await {
                error!("{:#}", e);
                cancel.cancel();
            }
        })
    };

    // Delivery failures are logged by the notifier
    session.notifier.send(&Alert::program_started()).await;

    info!(
        "Writing to {} every {}",
        session.config.output_dir.display(),
        session.config.period
    );
    session.runner.run(cancel.clone()).await;

    cancel.cancel();
    server.await.context("health server task panicked")?;
    info!("Stopped");
    Ok(())
}
