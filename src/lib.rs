//! # updated - DNS trust anchor and block list updater
//!
//! Periodically rebuilds a directory of files for DNS resolvers and
//! firewalls: the root hints, the DNSSEC root trust anchors, and hostname and
//! IP block lists for malicious, ads and surveillance domains, merged from
//! public sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        updated                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: run, once, healthcheck, version            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner (tokio JoinSet + interval)                          │
//! │    ├── Named root / root anchors tasks (md-5, sha2)         │
//! │    └── Block list tasks: malicious, ads, surveillance       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Builders                                                   │
//! │    ├── Fetcher (reqwest + rustls) + line pipeline           │
//! │    ├── Hostnames (regex) / IPs (ipnet, dns-lookup)          │
//! │    └── Dedup (prefix trie containment)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Output (atomic writes) ── Git (clone, pull, commit, push)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Health (axum) ── Alerts (gotify, webhook)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use updated::dedup;
//! use updated::dns::SystemResolver;
//! use updated::fetcher::{Fetcher, DEFAULT_TIMEOUT};
//! use updated::hostnames::HostnameBuilder;
//! use updated::ips::IpBuilder;
//! use updated::sources::Category;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cancel = CancellationToken::new();
//!     let fetcher = Arc::new(Fetcher::new(DEFAULT_TIMEOUT)?);
//!
//!     let hostnames = HostnameBuilder::new(Arc::clone(&fetcher))
//!         .build(&cancel, Category::Malicious)
//!         .await?;
//!
//!     let ips = IpBuilder::new(fetcher, Arc::new(SystemResolver));
//!     let mut entries = ips.resolve(&hostnames).await;
//!     entries.extend(ips.build(&cancel, Category::Malicious).await?);
//!
//!     let report = dedup::clean(&entries);
//!     println!("{} hostnames, {} IP lines", hostnames.len(), report.cleaned.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`alerts`] - Alert destinations (Gotify, Webhook)
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`dedup`] - IP/CIDR deduplication and containment
//! - [`fetcher`] - HTTP client for downloading sources
//! - [`git`] - Git snapshots of the output directory
//! - [`health`] - Health state and HTTP endpoint
//! - [`hostnames`] / [`ips`] - Block list builders
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`pipeline`] - Per-line cleaning and filtering
//! - [`runner`] - Update cycle orchestration
//! - [`tasks`] - The build tasks of a cycle
//! - [`trust_anchor`] - Checksum-verified trust anchor downloads

pub mod alerts;
pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod dns;
pub mod error;
pub mod fetcher;
pub mod fs_abstraction;
pub mod git;
pub mod health;
pub mod hostnames;
pub mod ips;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod signal;
pub mod sources;
pub mod tasks;
pub mod trust_anchor;
pub mod utils;
pub mod validation;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{DownloadError, FetchError, RunError};
