//! Bind address validation and human-facing URL formatting.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::TcpListener;

use crate::config::ConfigError;
use crate::net::listener::BindError;

/// A validated address to listen on.
///
/// `ip == None` means every interface: IPv6 `::` is tried first, with
/// `0.0.0.0` as the fallback on hosts without IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindAddress {
    ip: Option<IpAddr>,
    port: u16,
}

impl BindAddress {
    /// Validate the port range before any socket work happens.
    pub fn new(ip: Option<IpAddr>, port: i64) -> Result<Self, ConfigError> {
        if !(1..=65535).contains(&port) {
            return Err(ConfigError::InvalidPort { port });
        }
        Ok(Self {
            ip,
            port: port as u16,
        })
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Socket addresses to try, in order.
    pub fn candidates(&self) -> Vec<SocketAddr> {
        match self.ip {
            Some(ip) => vec![SocketAddr::new(ip, self.port)],
            None => vec![
                SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), self.port),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port),
            ],
        }
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "{}", SocketAddr::new(ip, self.port)),
            None => write!(f, "*:{}", self.port),
        }
    }
}

/// Probe the address with a throwaway bind.
///
/// The probe listener is dropped immediately; failures are classified the
/// same way a real bind failure would be.
pub async fn check_port(addr: &BindAddress) -> Result<(), BindError> {
    let listener = bind_first(addr).await?;
    drop(listener);
    Ok(())
}

/// Bind the first candidate address that succeeds.
pub(crate) async fn bind_first(addr: &BindAddress) -> Result<TcpListener, BindError> {
    let mut last_err = None;
    for candidate in addr.candidates() {
        match TcpListener::bind(candidate).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::debug!(address = %candidate, error = %e, "Bind attempt failed");
                last_err = Some(e);
            }
        }
    }
    let err = last_err.unwrap_or_else(|| std::io::Error::other("no bind candidates"));
    Err(BindError::classify(err, addr.port()))
}

/// Format a bound address as a URL a person can open.
///
/// Wildcard addresses become `localhost`, IPv6 literals are bracketed, and
/// the site root is appended.
pub fn format_address(ip: &str, port: u16, root: &str, https: bool) -> String {
    let mut hostname = match ip {
        "0.0.0.0" | "::" | "[::]" => "localhost".to_string(),
        other => other.to_string(),
    };
    if hostname.contains(':') && !hostname.starts_with('[') {
        hostname = format!("[{hostname}]");
    }
    let protocol = if https { "https" } else { "http" };
    let path = if root.starts_with('/') {
        root.to_string()
    } else {
        format!("/{root}")
    };
    let raw = format!("{protocol}://{hostname}:{port}{path}");

    // Normalizes IPv6 compression and percent-encodes the path.
    match url::Url::parse(&raw) {
        Ok(url) => url.to_string(),
        Err(_) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_ports() {
        for port in [-100, 0, 65536] {
            let err = BindAddress::new(None, port).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPort { port: p } if p == port));
        }
        assert!(BindAddress::new(None, 1).is_ok());
        assert!(BindAddress::new(None, 65535).is_ok());
    }

    #[test]
    fn wildcard_tries_ipv6_then_ipv4() {
        let addr = BindAddress::new(None, 4000).unwrap();
        let candidates = addr.candidates();
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].is_ipv6());
        assert!(candidates[1].is_ipv4());
    }

    #[test]
    fn wildcard_addresses_format_as_localhost() {
        assert_eq!(
            format_address("0.0.0.0", 4000, "/", false),
            "http://localhost:4000/"
        );
        assert_eq!(
            format_address("::", 4000, "/", true),
            "https://localhost:4000/"
        );
    }

    #[test]
    fn ipv6_literals_are_bracketed() {
        assert_eq!(
            format_address("::1", 4000, "/", false),
            "http://[::1]:4000/"
        );
        assert_eq!(
            format_address("fe80:0:0:0:0:0:0:1", 8080, "/", false),
            "http://[fe80::1]:8080/"
        );
    }

    #[test]
    fn root_is_appended() {
        assert_eq!(
            format_address("127.0.0.1", 4000, "blog/", false),
            "http://127.0.0.1:4000/blog/"
        );
        assert_eq!(
            format_address("127.0.0.1", 4000, "/docs/", false),
            "http://127.0.0.1:4000/docs/"
        );
    }

    #[tokio::test]
    async fn probe_reports_address_in_use() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = held.local_addr().unwrap().port();
        let addr = BindAddress::new(Some("127.0.0.1".parse().unwrap()), port as i64).unwrap();

        let err = check_port(&addr).await.unwrap_err();
        assert_eq!(err.code(), "EADDRINUSE");
    }

    #[tokio::test]
    async fn probe_releases_the_port() {
        let addr = BindAddress::new(Some("127.0.0.1".parse().unwrap()), 28391).unwrap();
        check_port(&addr).await.unwrap();
        // Probe must not keep the socket open.
        let _listener = TcpListener::bind("127.0.0.1:28391").await.unwrap();
    }
}
