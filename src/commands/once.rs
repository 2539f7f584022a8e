//! Once command: a single update cycle.

use anyhow::Result;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::signal::spawn_signal_handler;

/// Run one cycle; fails with the cycle's aggregate error.
pub async fn run(config_path: &Path) -> Result<()> {
    let session = Session::prepare(config_path)?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let result = session.runner.cycle(&cancel).await;
    // Also stops the signal handler
    cancel.cancel();
    Ok(result?)
}
