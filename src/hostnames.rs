//! Hostname block list builder.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::fetcher::Fetcher;
use crate::pipeline::process_body;
use crate::sources::{Category, Source};
use crate::utils::format_count;

static HOSTNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9])(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9]))*$",
    )
    .expect("valid hostname pattern")
});

/// Check a hostname against the label grammar.
///
/// Labels are 1 to 63 letters, digits or hyphens, separated by dots, and
/// never start or end with a hyphen.
///
/// # Examples
/// ```
/// use updated::hostnames::is_valid_hostname;
/// assert!(is_valid_hostname("ads.example.com"));
/// assert!(!is_valid_hostname("-bad.example.com"));
/// assert!(!is_valid_hostname("a..b"));
/// ```
pub fn is_valid_hostname(hostname: &str) -> bool {
    HOSTNAME_PATTERN.is_match(hostname)
}

/// Drop invalid hostnames, then sort and deduplicate the rest.
pub fn sorted_valid(hostnames: impl IntoIterator<Item = String>) -> Vec<String> {
    hostnames
        .into_iter()
        .filter(|hostname| {
            let valid = is_valid_hostname(hostname);
            if !valid {
                debug!("{:?} is not a valid hostname", hostname);
            }
            valid
        })
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Builds sorted, unique hostname lists per category.
pub struct HostnameBuilder {
    fetcher: Arc<Fetcher>,
}

impl HostnameBuilder {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Build the hostname list of `category` from its fixed sources
    pub async fn build(&self, cancel: &CancellationToken, category: Category) -> Result<Vec<String>> {
        self.build_for_sources(cancel, category.as_str(), &category.hostname_sources())
            .await
    }

    /// Fetch every source in order and merge the results.
    ///
    /// The first source that fails to fetch fails the whole build.
    pub async fn build_for_sources(
        &self,
        cancel: &CancellationToken,
        title: &str,
        sources: &[Source],
    ) -> Result<Vec<String>> {
        debug!("Building {} hostnames...", title);
        let mut unique: HashSet<String> = HashSet::new();
        let mut total = 0usize;

        for source in sources {
            let hostnames = self
                .build_for_source(cancel, source)
                .await
                .with_context(|| format!("building from {}", source.url))?;
            total += hostnames.len();
            unique.extend(hostnames);
        }

        let sorted = sorted_valid(unique);

        info!(
            "Built {} hostnames: {} fetched, {} unique",
            title,
            format_count(total),
            format_count(sorted.len())
        );
        Ok(sorted)
    }

    async fn build_for_source(&self, cancel: &CancellationToken, source: &Source) -> Result<Vec<String>> {
        debug!("Building hostnames from {}...", source.url);
        let start = Instant::now();

        let body = self.fetcher.fetch_text(cancel, &source.url).await?;
        let hostnames = process_body(&body, &source.format.rules().lowercased());

        info!("Built hostnames from {} in {:?}", source.url, start.elapsed());
        Ok(hostnames)
    }
}
