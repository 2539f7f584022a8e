//! Signal handling for graceful shutdown.
//!
//! SIGINT and SIGTERM cancel the root [`CancellationToken`]. The run loop and
//! the health server watch that token; fetches in flight are abandoned.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawn a task cancelling `cancel` on the first SIGINT or SIGTERM.
///
/// If signal handlers cannot be registered (e.g., in restricted environments),
/// a warning is logged and only the token's other owners can stop the program.
pub fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to register SIGINT handler: {}", e);
                None
            }
        };
        let sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                None
            }
        };

        let name = match (sigint, sigterm) {
            (Some(mut int), Some(mut term)) => {
                tokio::select! {
                    _ = int.recv() => "SIGINT",
                    _ = term.recv() => "SIGTERM",
                    _ = cancel.cancelled() => return,
                }
            }
            (Some(mut int), None) => {
                tokio::select! {
                    _ = int.recv() => "SIGINT",
                    _ = cancel.cancelled() => return,
                }
            }
            (None, Some(mut term)) => {
                tokio::select! {
                    _ = term.recv() => "SIGTERM",
                    _ = cancel.cancelled() => return,
                }
            }
            (None, None) => {
                warn!("No signal handlers registered - graceful shutdown disabled");
                return;
            }
        };

        info!("Received {}, initiating graceful shutdown...", name);
        cancel.cancel();
    });
}
