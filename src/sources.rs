//! Block list categories and their hard-coded sources.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::pipeline::{has_any_prefix, LineRules};

/// The three fixed block list categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Malicious,
    Ads,
    Surveillance,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Malicious, Category::Ads, Category::Surveillance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Malicious => "malicious",
            Category::Ads => "ads",
            Category::Surveillance => "surveillance",
        }
    }

    pub fn hostnames_filename(&self) -> &'static str {
        match self {
            Category::Malicious => "malicious-hostnames.updated",
            Category::Ads => "ads-hostnames.updated",
            Category::Surveillance => "surveillance-hostnames.updated",
        }
    }

    pub fn ips_filename(&self) -> &'static str {
        match self {
            Category::Malicious => "malicious-ips.updated",
            Category::Ads => "ads-ips.updated",
            Category::Surveillance => "surveillance-ips.updated",
        }
    }

    /// Hostname sources, in fetch order.
    pub fn hostname_sources(&self) -> Vec<Source> {
        match self {
            Category::Malicious => vec![
                Source::new(
                    "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts",
                    SourceFormat::HostsFile,
                ),
                Source::new(
                    "https://raw.githubusercontent.com/k0nsl/unbound-blocklist/master/blocks.conf",
                    SourceFormat::UnboundLocalZone,
                ),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/abuse-nl.txt"),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/fraud-nl.txt"),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/tracking-nl.txt"),
            ],
            Category::Ads => vec![
                Source::new(
                    "https://raw.githubusercontent.com/notracking/hosts-blocklists/master/domains.txt",
                    SourceFormat::DnsmasqAddress,
                ),
                Source::new(
                    "https://raw.githubusercontent.com/notracking/hosts-blocklists/master/hostnames.txt",
                    SourceFormat::ZeroHosts,
                ),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/ads-nl.txt"),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/malware-nl.txt"),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/phishing-nl.txt"),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/ransomware-nl.txt"),
                Source::plain("https://blocklistproject.github.io/Lists/alt-version/scam-nl.txt"),
            ],
            Category::Surveillance => vec![Source::plain(
                "https://raw.githubusercontent.com/dyne/domain-list/master/data/nsa",
            )],
        }
    }

    /// IP/CIDR sources, in fetch order. Only malicious has any.
    pub fn ip_sources(&self) -> Vec<Source> {
        match self {
            Category::Malicious => vec![
                Source::new(
                    "https://iplists.firehol.org/files/firehol_level1.netset",
                    SourceFormat::Netset,
                ),
                Source::new(
                    "https://raw.githubusercontent.com/stamparm/ipsum/master/levels/2.txt",
                    SourceFormat::IpsumLog,
                ),
            ],
            Category::Ads | Category::Surveillance => Vec::new(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of a source, selecting its custom pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// One entry per line, no custom steps
    Plain,
    /// `0.0.0.0 host` hosts file with loopback/broadcast header entries
    HostsFile,
    /// unbound `local-zone: "host" redirect` lines
    UnboundLocalZone,
    /// dnsmasq `address=/host/0.0.0.0` lines
    DnsmasqAddress,
    /// `0.0.0.0 host.` lines with `:: host.` IPv6 duplicates
    ZeroHosts,
    /// FireHOL netset
    Netset,
    /// Free-form lines each carrying one IPv4 address
    IpsumLog,
}

impl SourceFormat {
    /// Pipeline rules for this format.
    pub fn rules(&self) -> LineRules {
        match self {
            SourceFormat::Plain => LineRules::plain(),
            SourceFormat::HostsFile => LineRules {
                pre_clean: Some(hosts_file_pre_clean),
                check: Some(hosts_file_check),
                ..LineRules::plain()
            },
            SourceFormat::UnboundLocalZone => LineRules {
                pre_clean: Some(unbound_pre_clean),
                check: Some(unbound_check),
                ..LineRules::plain()
            },
            SourceFormat::DnsmasqAddress => LineRules {
                check: Some(dnsmasq_check),
                post_clean: Some(dnsmasq_post_clean),
                ..LineRules::plain()
            },
            SourceFormat::ZeroHosts => LineRules {
                check: Some(zero_hosts_check),
                post_clean: Some(zero_hosts_post_clean),
                ..LineRules::plain()
            },
            SourceFormat::Netset => LineRules {
                check: Some(netset_check),
                ..LineRules::plain()
            },
            SourceFormat::IpsumLog => LineRules {
                pre_clean: Some(first_ipv4),
                ..LineRules::plain()
            },
        }
    }
}

/// One fetchable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub format: SourceFormat,
}

impl Source {
    pub fn new(url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            url: url.into(),
            format,
        }
    }

    pub fn plain(url: impl Into<String>) -> Self {
        Self::new(url, SourceFormat::Plain)
    }
}

fn hosts_file_pre_clean(line: &str) -> String {
    let line = line.strip_prefix("0.0.0.0 ").unwrap_or(line);
    if line == "0.0.0.0" {
        return String::new();
    }
    line.to_string()
}

fn hosts_file_check(line: &str) -> bool {
    !has_any_prefix(
        line,
        &[
            "127.0.0.1 ",
            "255.255.255.255",
            "::1",
            "fe80::1",
            "ff00::0",
            "ff02::1",
            "ff02::2",
            "ff02:",
        ],
    )
}

fn unbound_pre_clean(line: &str) -> String {
    let line = line.strip_prefix("local-zone: \"").unwrap_or(line);
    let line = line.strip_suffix("\" redirect").unwrap_or(line);
    line.to_string()
}

fn unbound_check(line: &str) -> bool {
    !line.starts_with("local-data: \"")
}

fn dnsmasq_check(line: &str) -> bool {
    !line.ends_with("/::")
}

fn dnsmasq_post_clean(line: &str) -> String {
    let line = line.strip_prefix("address=/").unwrap_or(line);
    let line = line.strip_suffix("/0.0.0.0").unwrap_or(line);
    line.strip_suffix('.').unwrap_or(line).to_string()
}

fn zero_hosts_check(line: &str) -> bool {
    !line.starts_with(":: ")
}

fn zero_hosts_post_clean(line: &str) -> String {
    let line = line.strip_prefix("0.0.0.0 ").unwrap_or(line);
    line.strip_suffix('.').unwrap_or(line).to_string()
}

fn netset_check(line: &str) -> bool {
    line != "0.0.0.0/8"
}

static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b")
        .expect("valid IPv4 pattern")
});

/// First IPv4-looking token of `line`, or an empty string.
fn first_ipv4(line: &str) -> String {
    IPV4_PATTERN
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(format: SourceFormat, line: &str) -> Option<String> {
        format.rules().apply(line)
    }

    #[test]
    fn test_category_filenames() {
        assert_eq!(Category::Malicious.hostnames_filename(), "malicious-hostnames.updated");
        assert_eq!(Category::Malicious.ips_filename(), "malicious-ips.updated");
        assert_eq!(Category::Ads.hostnames_filename(), "ads-hostnames.updated");
        assert_eq!(Category::Ads.ips_filename(), "ads-ips.updated");
        assert_eq!(Category::Surveillance.hostnames_filename(), "surveillance-hostnames.updated");
        assert_eq!(Category::Surveillance.ips_filename(), "surveillance-ips.updated");
    }

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(Category::Malicious.hostname_sources().len(), 5);
        assert_eq!(Category::Ads.hostname_sources().len(), 7);
        assert_eq!(Category::Surveillance.hostname_sources().len(), 1);
        assert_eq!(Category::Malicious.ip_sources().len(), 2);
        assert!(Category::Ads.ip_sources().is_empty());
        assert!(Category::Surveillance.ip_sources().is_empty());
    }

    #[test]
    fn test_catalog_urls_are_https() {
        for category in Category::ALL {
            for source in category.hostname_sources().iter().chain(&category.ip_sources()) {
                assert!(source.url.starts_with("https://"), "{}", source.url);
            }
        }
    }

    #[test]
    fn test_hosts_file() {
        assert_eq!(run(SourceFormat::HostsFile, "0.0.0.0 ads.com"), Some("ads.com".into()));
        assert_eq!(run(SourceFormat::HostsFile, "0.0.0.0"), None);
        assert_eq!(run(SourceFormat::HostsFile, "127.0.0.1 localhost"), None);
        assert_eq!(run(SourceFormat::HostsFile, "255.255.255.255 broadcasthost"), None);
        assert_eq!(run(SourceFormat::HostsFile, "::1 localhost"), None);
        assert_eq!(run(SourceFormat::HostsFile, "fe80::1%lo0 localhost"), None);
        assert_eq!(run(SourceFormat::HostsFile, "ff02::2 ip6-allrouters"), None);
        assert_eq!(run(SourceFormat::HostsFile, "# comment"), None);
    }

    #[test]
    fn test_unbound_local_zone() {
        assert_eq!(
            run(SourceFormat::UnboundLocalZone, "local-zone: \"bad.example\" redirect"),
            Some("bad.example".into())
        );
        assert_eq!(
            run(SourceFormat::UnboundLocalZone, "local-data: \"bad.example A 127.0.0.1\""),
            None
        );
    }

    #[test]
    fn test_dnsmasq_address() {
        assert_eq!(
            run(SourceFormat::DnsmasqAddress, "address=/ads.example./0.0.0.0"),
            Some("ads.example".into())
        );
        assert_eq!(run(SourceFormat::DnsmasqAddress, "address=/ads.example/::"), None);
    }

    #[test]
    fn test_zero_hosts() {
        assert_eq!(
            run(SourceFormat::ZeroHosts, "0.0.0.0 tracker.example."),
            Some("tracker.example".into())
        );
        assert_eq!(run(SourceFormat::ZeroHosts, ":: tracker.example."), None);
    }

    #[test]
    fn test_netset() {
        assert_eq!(run(SourceFormat::Netset, "0.0.0.0/8"), None);
        assert_eq!(run(SourceFormat::Netset, "1.10.16.0/20"), Some("1.10.16.0/20".into()));
    }

    #[test]
    fn test_ipsum_extracts_first_ipv4() {
        assert_eq!(run(SourceFormat::IpsumLog, "45.148.10.92\t7"), Some("45.148.10.92".into()));
        assert_eq!(
            run(SourceFormat::IpsumLog, "seen 1.2.3.4 then 5.6.7.8"),
            Some("1.2.3.4".into())
        );
        assert_eq!(run(SourceFormat::IpsumLog, "no address here"), None);
        assert_eq!(run(SourceFormat::IpsumLog, "# IPsum Threat Intelligence Feed"), None);
    }
}
