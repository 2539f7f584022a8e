//! DNSSEC trust anchor downloads.
//!
//! Two files are mirrored: the root hints (`named.root`) and the IANA root
//! anchors XML. Both are checked against an expected hex digest before the
//! caller gets the bytes, and the XML is turned into DS records for resolvers
//! that want a plain key file.

use md5::Md5;
use quick_xml::events::Event;
use quick_xml::{DeError, Reader};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DownloadError;
use crate::fetcher::Fetcher;

pub const NAMED_ROOT_URL: &str = "https://www.internic.net/domain/named.root";
pub const ROOT_ANCHORS_URL: &str = "https://data.iana.org/root-anchors/root-anchors.xml";

/// SHA-256 of the root anchors XML published by IANA
pub const DEFAULT_ROOT_ANCHORS_SHA256: &str =
    "45336725f9126db810a59896ae93819de743c416262f79c4444042c92e520770";

/// Downloads and verifies the trust anchor files.
pub struct TrustAnchorClient {
    fetcher: Arc<Fetcher>,
    named_root_url: String,
    root_anchors_url: String,
    /// Empty disables verification of the named root
    named_root_md5: String,
    root_anchors_sha256: String,
}

impl TrustAnchorClient {
    /// Client for the well-known IANA/InterNIC locations.
    pub fn new(fetcher: Arc<Fetcher>, named_root_md5: &str, root_anchors_sha256: &str) -> Self {
        Self::with_urls(
            fetcher,
            NAMED_ROOT_URL,
            ROOT_ANCHORS_URL,
            named_root_md5,
            root_anchors_sha256,
        )
    }

    pub fn with_urls(
        fetcher: Arc<Fetcher>,
        named_root_url: &str,
        root_anchors_url: &str,
        named_root_md5: &str,
        root_anchors_sha256: &str,
    ) -> Self {
        Self {
            fetcher,
            named_root_url: named_root_url.to_string(),
            root_anchors_url: root_anchors_url.to_string(),
            named_root_md5: named_root_md5.trim().to_string(),
            root_anchors_sha256: root_anchors_sha256.trim().to_string(),
        }
    }

    /// Download `named.root`, verifying its MD5 unless no checksum is set.
    pub async fn download_named_root(&self, cancel: &CancellationToken) -> Result<Vec<u8>, DownloadError> {
        info!("Downloading named root...");
        let body = self.fetcher.fetch(cancel, &self.named_root_url).await?;
        if self.named_root_md5.is_empty() {
            debug!("No named root MD5 configured, skipping verification");
            return Ok(body);
        }
        verify(&hex::encode(Md5::digest(&body)), &self.named_root_md5)?;
        Ok(body)
    }

    /// Download the root anchors XML and verify its SHA-256.
    pub async fn download_root_anchors(&self, cancel: &CancellationToken) -> Result<Vec<u8>, DownloadError> {
        info!("Downloading root anchors...");
        let body = self.fetcher.fetch(cancel, &self.root_anchors_url).await?;
        verify(&hex::encode(Sha256::digest(&body)), &self.root_anchors_sha256)?;
        Ok(body)
    }
}

fn verify(computed: &str, expected: &str) -> Result<(), DownloadError> {
    if computed.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    Err(DownloadError::ChecksumMismatch {
        computed: computed.to_string(),
        expected: expected.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct TrustAnchor {
    #[serde(rename = "KeyDigest", default)]
    key_digests: Vec<KeyDigest>,
}

#[derive(Debug, Deserialize)]
struct KeyDigest {
    #[serde(rename = "KeyTag")]
    key_tag: u32,
    #[serde(rename = "Algorithm")]
    algorithm: u32,
    #[serde(rename = "DigestType")]
    digest_type: u32,
    #[serde(rename = "Digest")]
    digest: String,
}

/// Convert root anchors XML into `. IN DS` records, one per `KeyDigest`,
/// in document order.
///
/// # Examples
/// ```
/// let xml = br#"<TrustAnchor><Zone>.</Zone><KeyDigest><KeyTag>20326</KeyTag>
/// <Algorithm>8</Algorithm><DigestType>2</DigestType><Digest>E06D</Digest></KeyDigest></TrustAnchor>"#;
/// let records = updated::trust_anchor::to_key_records(xml).unwrap();
/// assert_eq!(records, vec![". IN DS 20326 8 2 E06D"]);
/// ```
pub fn to_key_records(xml: &[u8]) -> Result<Vec<String>, DeError> {
    check_root(xml)?;
    let anchor: TrustAnchor = quick_xml::de::from_reader(xml)?;
    Ok(anchor
        .key_digests
        .iter()
        .map(|kd| {
            format!(
                ". IN DS {} {} {} {}",
                kd.key_tag,
                kd.algorithm,
                kd.digest_type,
                kd.digest.trim()
            )
        })
        .collect())
}

/// Reject documents whose root element is not `TrustAnchor`; serde does not
/// look at the root name.
fn check_root(xml: &[u8]) -> Result<(), DeError> {
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event().map_err(|e| DeError::Custom(e.to_string()))? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                if name.as_ref() == b"TrustAnchor" {
                    return Ok(());
                }
                return Err(DeError::Custom(format!(
                    "expected TrustAnchor root element, found {}",
                    String::from_utf8_lossy(name.as_ref())
                )));
            }
            Event::Eof => return Err(DeError::Custom("no root element".to_string())),
            _ => {}
        }
    }
}
