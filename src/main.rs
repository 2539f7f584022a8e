//! updated - DNS trust anchor and block list updater
//!
//! Keeps a directory of resolver files fresh: root hints, root trust
//! anchors and per-category hostname and IP block lists.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use updated::cli::{Cli, Commands};
use updated::config::Config;
use updated::fs_abstraction::real_fs;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flags win over the configured level
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        configured_level(&cli.config)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run => updated::commands::run::run(&cli.config).await,
        Commands::Once => updated::commands::once::run(&cli.config).await,
        Commands::Healthcheck { url } => updated::commands::healthcheck::run(&url).await,
        Commands::Version => {
            println!("updated {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Level from the config file and environment, INFO when unreadable.
///
/// Config errors are reported properly once the command loads it again.
fn configured_level(config_path: &Path) -> Level {
    let Ok(mut config) = Config::load_or_default(real_fs(), config_path) else {
        return Level::INFO;
    };
    if config.apply_env().is_err() {
        return Level::INFO;
    }
    config.log_level.parse().unwrap_or(Level::INFO)
}
