//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "updated")]
#[command(author, version, about = "DNS trust anchor and block list updater")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (missing file means defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Update files once per period and serve the health endpoint
    Run,

    /// Run a single update cycle and exit
    Once,

    /// Query the health endpoint of a running instance
    Healthcheck {
        /// Health endpoint URL
        #[arg(long, default_value = "http://127.0.0.1:9999")]
        url: String,
    },

    /// Show version
    Version,
}
