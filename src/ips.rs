//! IP/CIDR block list builder.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dns::HostResolver;
use crate::fetcher::Fetcher;
use crate::pipeline::process_body;
use crate::sources::{Category, Source};
use crate::utils::format_count;

/// Maximum concurrent DNS lookups when resolving hostnames
const MAX_CONCURRENT_LOOKUPS: usize = 100;

/// Ranges that never belong in a block list.
static PRIVATE_NETS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "127.0.0.0/8",    // loopback
        "10.0.0.0/8",     // RFC1918
        "172.16.0.0/12",  // RFC1918
        "192.168.0.0/16", // RFC1918
        "169.254.0.0/16", // link-local
        "224.0.0.0/24",   // link-local multicast
        "::1/128",        // loopback
        "fc00::/7",       // unique local
        "fe80::/10",      // link-local
        "ff02::/16",      // link-local multicast
    ]
    .iter()
    .filter_map(|s| s.parse().ok())
    .collect()
});

/// True for loopback, link-local and private addresses.
///
/// IPv4-mapped IPv6 addresses are judged by their IPv4 form.
pub fn is_private(ip: IpAddr) -> bool {
    let ip = ip.to_canonical();
    ip.is_loopback() || PRIVATE_NETS.iter().any(|net| net.contains(&ip))
}

/// A classified block list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Address(IpAddr),
    Network(IpNet),
}

impl Entry {
    /// Classify a line as a single address, else a CIDR block.
    pub fn parse(line: &str) -> Option<Self> {
        if let Ok(ip) = line.parse::<IpAddr>() {
            return Some(Entry::Address(ip.to_canonical()));
        }
        line.parse::<IpNet>().ok().map(Entry::Network)
    }

    /// Whether the entry falls in a private range.
    ///
    /// A block is judged by the address it was written with.
    pub fn is_private(&self) -> bool {
        match self {
            Entry::Address(ip) => is_private(*ip),
            Entry::Network(net) => is_private(net.addr()),
        }
    }

    /// Canonical string form: address, or network address plus prefix length
    pub fn canonical(&self) -> String {
        match self {
            Entry::Address(ip) => ip.to_string(),
            Entry::Network(net) => net.trunc().to_string(),
        }
    }
}

/// Builds raw IP/CIDR lists per category.
pub struct IpBuilder {
    fetcher: Arc<Fetcher>,
    resolver: Arc<dyn HostResolver>,
}

impl IpBuilder {
    pub fn new(fetcher: Arc<Fetcher>, resolver: Arc<dyn HostResolver>) -> Self {
        Self { fetcher, resolver }
    }

    /// Build the raw IP/CIDR entries of `category` from its fixed sources
    pub async fn build(&self, cancel: &CancellationToken, category: Category) -> Result<Vec<String>> {
        self.build_for_sources(cancel, category.as_str(), &category.ip_sources())
            .await
    }

    /// Fetch every source in order and concatenate their entries.
    ///
    /// Entries are canonical but not deduplicated; see [`crate::dedup::clean`].
    pub async fn build_for_sources(
        &self,
        cancel: &CancellationToken,
        title: &str,
        sources: &[Source],
    ) -> Result<Vec<String>> {
        info!("Building {} IPs...", title);
        let mut entries = Vec::new();
        for source in sources {
            let new_entries = self
                .build_for_source(cancel, source)
                .await
                .with_context(|| format!("building from {}", source.url))?;
            entries.extend(new_entries);
        }
        info!(
            "Built {} IPs: {} IP address lines fetched",
            title,
            format_count(entries.len())
        );
        Ok(entries)
    }

    async fn build_for_source(&self, cancel: &CancellationToken, source: &Source) -> Result<Vec<String>> {
        debug!("Building IPs from {}...", source.url);
        let start = Instant::now();

        let body = self.fetcher.fetch_text(cancel, &source.url).await?;
        let entries = classify_lines(process_body(&body, &source.format.rules()));

        info!("Built IPs from {} in {:?}", source.url, start.elapsed());
        Ok(entries)
    }

    /// Resolve `hostnames` to public addresses.
    ///
    /// Best effort: a hostname that fails to resolve is logged and skipped.
    pub async fn resolve(&self, hostnames: &[String]) -> Vec<String> {
        info!("Finding IP addresses from {} hostnames", format_count(hostnames.len()));

        let resolved: Vec<Vec<IpAddr>> = stream::iter(hostnames.iter().cloned().map(|hostname| {
            let resolver = Arc::clone(&self.resolver);
            async move {
                match resolver.lookup(&hostname).await {
                    Ok(ips) => ips,
                    Err(e) => {
                        debug!("Cannot resolve {}: {}", hostname, e);
                        Vec::new()
                    }
                }
            }
        }))
        .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
        .collect()
        .await;

        let ips: Vec<String> = resolved
            .into_iter()
            .flatten()
            .map(|ip| ip.to_canonical())
            .filter(|ip| !is_private(*ip))
            .map(|ip| ip.to_string())
            .collect();

        info!(
            "Found {} IP addresses from {} hostnames",
            format_count(ips.len()),
            format_count(hostnames.len())
        );
        ips
    }
}

/// Keep public addresses and blocks, in canonical form.
///
/// Lines that are neither are logged and dropped.
pub fn classify_lines(lines: Vec<String>) -> Vec<String> {
    let mut entries = Vec::with_capacity(lines.len());
    for line in lines {
        match Entry::parse(&line) {
            Some(entry) if !entry.is_private() => entries.push(entry.canonical()),
            Some(_) => {}
            None => warn!("{:?} is not an IP address nor an IP subnet", line),
        }
    }
    entries
}
