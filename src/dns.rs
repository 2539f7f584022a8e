//! DNS resolution utilities for updated.

use async_trait::async_trait;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

/// Default DNS resolution timeout in seconds
const DNS_TIMEOUT_SECS: u64 = 5;

/// Forward hostname resolution, injectable for tests.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `hostname` to all of its addresses.
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system's `getaddrinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        lookup_host(hostname).await
    }
}

/// Resolver answering from a fixed table, shared by unit tests.
#[cfg(test)]
pub(crate) struct TableResolver(pub(crate) std::collections::HashMap<&'static str, Vec<IpAddr>>);

#[cfg(test)]
#[async_trait]
impl HostResolver for TableResolver {
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        self.0
            .get(hostname)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such host"))
    }
}

/// Resolve a hostname with timeout.
///
/// The lookup itself is blocking, so it runs on the blocking pool.
pub async fn lookup_host(hostname: &str) -> io::Result<Vec<IpAddr>> {
    let host = hostname.to_string();
    let dns_future = tokio::task::spawn_blocking(move || dns_lookup::lookup_host(&host));

    match tokio::time::timeout(Duration::from_secs(DNS_TIMEOUT_SECS), dns_future).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(io::Error::other(format!("DNS task failed: {e}"))),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("DNS timeout resolving {hostname}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_localhost() {
        // localhost resolves through /etc/hosts on every sane system
        let result = SystemResolver.lookup("localhost").await;
        if let Ok(addrs) = result {
            assert!(addrs.iter().all(|ip| ip.is_loopback()));
        }
    }

    #[tokio::test]
    async fn test_table_resolver() {
        let resolver = TableResolver(std::collections::HashMap::from([(
            "ads.example",
            vec!["1.2.3.4".parse().unwrap()],
        )]));
        assert_eq!(
            resolver.lookup("ads.example").await.unwrap(),
            vec!["1.2.3.4".parse::<IpAddr>().unwrap()]
        );
        let err = resolver.lookup("missing.example").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_invalid_name() {
        let result = lookup_host("definitely-not-a-real-host.invalid").await;
        assert!(result.is_err());
    }
}
