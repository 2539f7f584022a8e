//! The five build tasks of an update cycle.
//!
//! Each task fetches what it needs, writes its own files and reports a
//! single error. Tasks share nothing but the HTTP client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dedup;
use crate::hostnames::HostnameBuilder;
use crate::ips::IpBuilder;
use crate::output::{
    OutputWriter, ANCHOR_MODE, LIST_MODE, NAMED_ROOT_FILENAME, ROOT_ANCHORS_FILENAME,
    ROOT_KEY_FILENAME,
};
use crate::sources::{Category, Source};
use crate::trust_anchor::{to_key_records, TrustAnchorClient};
use crate::utils::format_count;

/// One unit of work of an update cycle.
#[async_trait]
pub trait BuildTask: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn run(&self, cancel: &CancellationToken) -> Result<()>;
}

/// Mirrors `named.root`.
pub struct NamedRootTask {
    client: Arc<TrustAnchorClient>,
    output: OutputWriter,
}

impl NamedRootTask {
    pub fn new(client: Arc<TrustAnchorClient>, output: OutputWriter) -> Self {
        Self { client, output }
    }
}

#[async_trait]
impl BuildTask for NamedRootTask {
    fn name(&self) -> &str {
        "named root"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let named_root = self
            .client
            .download_named_root(cancel)
            .await
            .context("downloading named root")?;
        self.output
            .write_bytes(NAMED_ROOT_FILENAME, &named_root, ANCHOR_MODE)
    }
}

/// Mirrors the root anchors XML and derives the root key file from it.
pub struct RootAnchorsTask {
    client: Arc<TrustAnchorClient>,
    output: OutputWriter,
}

impl RootAnchorsTask {
    pub fn new(client: Arc<TrustAnchorClient>, output: OutputWriter) -> Self {
        Self { client, output }
    }
}

#[async_trait]
impl BuildTask for RootAnchorsTask {
    fn name(&self) -> &str {
        "root anchors"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let xml = self
            .client
            .download_root_anchors(cancel)
            .await
            .context("downloading root anchors XML")?;
        // Parse before writing anything so a bad document leaves both files alone
        let root_keys = to_key_records(&xml)?;

        self.output
            .write_bytes(ROOT_ANCHORS_FILENAME, &xml, ANCHOR_MODE)?;
        self.output
            .write_lines(ROOT_KEY_FILENAME, &root_keys, ANCHOR_MODE)?;
        info!("Wrote {} root keys", root_keys.len());
        Ok(())
    }
}

/// Builds the hostname and IP lists of one category.
pub struct BlockListTask {
    category: Category,
    hostname_sources: Vec<Source>,
    ip_sources: Vec<Source>,
    hostnames: Arc<HostnameBuilder>,
    ips: Arc<IpBuilder>,
    output: OutputWriter,
    resolve_hostnames: bool,
}

impl BlockListTask {
    /// Task fetching the category's hard-coded sources
    pub fn for_category(
        category: Category,
        hostnames: Arc<HostnameBuilder>,
        ips: Arc<IpBuilder>,
        output: OutputWriter,
        resolve_hostnames: bool,
    ) -> Self {
        Self::with_sources(
            category,
            category.hostname_sources(),
            category.ip_sources(),
            hostnames,
            ips,
            output,
            resolve_hostnames,
        )
    }

    pub fn with_sources(
        category: Category,
        hostname_sources: Vec<Source>,
        ip_sources: Vec<Source>,
        hostnames: Arc<HostnameBuilder>,
        ips: Arc<IpBuilder>,
        output: OutputWriter,
        resolve_hostnames: bool,
    ) -> Self {
        Self {
            category,
            hostname_sources,
            ip_sources,
            hostnames,
            ips,
            output,
            resolve_hostnames,
        }
    }
}

#[async_trait]
impl BuildTask for BlockListTask {
    fn name(&self) -> &str {
        self.category.as_str()
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let category = self.category;
        let hostnames = self
            .hostnames
            .build_for_sources(cancel, category.as_str(), &self.hostname_sources)
            .await
            .with_context(|| format!("building {} hostnames", category))?;
        self.output
            .write_lines(category.hostnames_filename(), &hostnames, LIST_MODE)
            .context("writing hostnames")?;

        let mut entries = Vec::new();
        if self.resolve_hostnames {
            entries.extend(self.ips.resolve(&hostnames).await);
        }
        if !self.ip_sources.is_empty() {
            let fetched = self
                .ips
                .build_for_sources(cancel, category.as_str(), &self.ip_sources)
                .await
                .with_context(|| format!("building {} IPs", category))?;
            entries.extend(fetched);
        }

        let report = dedup::clean(&entries);
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        info!(
            "Trimmed down {} IP address lines for {}",
            format_count(report.removed),
            category
        );

        self.output
            .write_lines(category.ips_filename(), &report.cleaned, LIST_MODE)
            .context("writing IPs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::TableResolver;
    use crate::fetcher::{Fetcher, DEFAULT_TIMEOUT};
    use crate::fs_abstraction::RealFileSystem;
    use crate::sources::SourceFormat;
    use crate::trust_anchor::DEFAULT_ROOT_ANCHORS_SHA256;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const XML: &str = "<TrustAnchor><Zone>.</Zone><KeyDigest><KeyTag>20326</KeyTag>\
        <Algorithm>8</Algorithm><DigestType>2</DigestType><Digest>E06D</Digest></KeyDigest></TrustAnchor>";


    async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn fetcher() -> Arc<Fetcher> {
        Arc::new(Fetcher::new(DEFAULT_TIMEOUT).unwrap())
    }

    fn writer(dir: &Path) -> OutputWriter {
        OutputWriter::new(Arc::new(RealFileSystem), dir)
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    fn anchors(server: &MockServer, sha256: &str) -> Arc<TrustAnchorClient> {
        anchors_with_md5(server, "", sha256)
    }

    fn anchors_with_md5(server: &MockServer, md5: &str, sha256: &str) -> Arc<TrustAnchorClient> {
        Arc::new(TrustAnchorClient::with_urls(
            fetcher(),
            &format!("{}/named.root", server.uri()),
            &format!("{}/root-anchors.xml", server.uri()),
            md5,
            sha256,
        ))
    }

    fn block_list_task(server: &MockServer, dir: &Path, resolve: bool) -> BlockListTask {
        let fetcher = fetcher();
        let resolver = TableResolver(HashMap::from([
            ("ads.example", vec!["1.2.3.4".parse().unwrap()]),
            ("tracker.example", vec!["10.0.0.1".parse().unwrap()]),
        ]));
        BlockListTask::with_sources(
            Category::Malicious,
            vec![Source::new(format!("{}/hosts", server.uri()), SourceFormat::HostsFile)],
            vec![Source::new(format!("{}/netset", server.uri()), SourceFormat::Netset)],
            Arc::new(HostnameBuilder::new(Arc::clone(&fetcher))),
            Arc::new(IpBuilder::new(fetcher, Arc::new(resolver))),
            writer(dir),
            resolve,
        )
    }

    #[tokio::test]
    async fn test_named_root_task_writes_file() {
        let server = MockServer::start().await;
        serve(&server, "/named.root", 200, ";  root hints").await;
        let dir = TempDir::new().unwrap();

        NamedRootTask::new(anchors(&server, DEFAULT_ROOT_ANCHORS_SHA256), writer(dir.path()))
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(read(dir.path(), NAMED_ROOT_FILENAME), ";  root hints");
    }

    #[tokio::test]
    async fn test_named_root_md5_mismatch_keeps_previous_file() {
        let server = MockServer::start().await;
        serve(&server, "/named.root", 200, ";  tampered hints").await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(NAMED_ROOT_FILENAME), ";  old hints").unwrap();

        let wrong_md5 = hex::encode(md5::Md5::digest(b";  root hints"));
        let err = NamedRootTask::new(
            anchors_with_md5(&server, &wrong_md5, DEFAULT_ROOT_ANCHORS_SHA256),
            writer(dir.path()),
        )
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

        let text = format!("{err:#}");
        assert!(text.contains("downloading named root"), "{text}");
        assert!(text.contains("checksum does not match"), "{text}");
        assert_eq!(read(dir.path(), NAMED_ROOT_FILENAME), ";  old hints");
    }

    #[tokio::test]
    async fn test_root_anchors_wrong_root_element_keeps_previous_files() {
        let body = "<html><body>Service unavailable</body></html>";
        let server = MockServer::start().await;
        serve(&server, "/root-anchors.xml", 200, body).await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(ROOT_KEY_FILENAME), ". IN DS 1 8 2 AA").unwrap();
        let sha = hex::encode(Sha256::digest(body.as_bytes()));

        let err = RootAnchorsTask::new(anchors(&server, &sha), writer(dir.path()))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("TrustAnchor"), "{err:#}");
        assert!(!dir.path().join(ROOT_ANCHORS_FILENAME).exists());
        assert_eq!(read(dir.path(), ROOT_KEY_FILENAME), ". IN DS 1 8 2 AA");
    }

    #[tokio::test]
    async fn test_root_anchors_task_writes_xml_and_keys() {
        let server = MockServer::start().await;
        serve(&server, "/root-anchors.xml", 200, XML).await;
        let dir = TempDir::new().unwrap();
        let sha = hex::encode(Sha256::digest(XML.as_bytes()));

        RootAnchorsTask::new(anchors(&server, &sha), writer(dir.path()))
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(read(dir.path(), ROOT_ANCHORS_FILENAME), XML);
        assert_eq!(read(dir.path(), ROOT_KEY_FILENAME), ". IN DS 20326 8 2 E06D");
    }

    #[tokio::test]
    async fn test_root_anchors_checksum_mismatch_writes_nothing() {
        let server = MockServer::start().await;
        serve(&server, "/root-anchors.xml", 200, XML).await;
        let dir = TempDir::new().unwrap();

        let err = RootAnchorsTask::new(anchors(&server, DEFAULT_ROOT_ANCHORS_SHA256), writer(dir.path()))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("checksum does not match"));
        assert!(!dir.path().join(ROOT_ANCHORS_FILENAME).exists());
        assert!(!dir.path().join(ROOT_KEY_FILENAME).exists());
    }

    #[tokio::test]
    async fn test_block_list_task() {
        let server = MockServer::start().await;
        serve(&server, "/hosts", 200, "0.0.0.0 tracker.example\n0.0.0.0 ads.example\n").await;
        serve(&server, "/netset", 200, "1.2.3.0/24\n5.6.7.8\n5.6.7.8\n").await;
        let dir = TempDir::new().unwrap();

        block_list_task(&server, dir.path(), true)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            read(dir.path(), "malicious-hostnames.updated"),
            "ads.example\ntracker.example"
        );
        // 1.2.3.4 is inside 1.2.3.0/24 and 10.0.0.1 is private
        assert_eq!(read(dir.path(), "malicious-ips.updated"), "1.2.3.0/24\n5.6.7.8");
    }

    #[tokio::test]
    async fn test_block_list_task_ip_failure_keeps_old_ip_file() {
        let server = MockServer::start().await;
        serve(&server, "/hosts", 200, "0.0.0.0 ads.example\n").await;
        serve(&server, "/netset", 404, "").await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("malicious-ips.updated"), "9.9.9.9").unwrap();

        let err = block_list_task(&server, dir.path(), false)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("404"));
        assert_eq!(read(dir.path(), "malicious-hostnames.updated"), "ads.example");
        assert_eq!(read(dir.path(), "malicious-ips.updated"), "9.9.9.9");
    }

    #[tokio::test]
    async fn test_block_list_task_without_ip_sources() {
        let server = MockServer::start().await;
        serve(&server, "/hosts", 200, "0.0.0.0 ads.example\n").await;
        let dir = TempDir::new().unwrap();

        let fetcher = fetcher();
        let task = BlockListTask::with_sources(
            Category::Ads,
            vec![Source::new(format!("{}/hosts", server.uri()), SourceFormat::HostsFile)],
            Vec::new(),
            Arc::new(HostnameBuilder::new(Arc::clone(&fetcher))),
            Arc::new(IpBuilder::new(fetcher, Arc::new(TableResolver(HashMap::new())))),
            writer(dir.path()),
            false,
        );
        task.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(task.name(), "ads");
        assert_eq!(read(dir.path(), "ads-ips.updated"), "");
    }
}
