//! TCP listener binding with error classification.
//!
//! # Responsibilities
//! - Bind to the validated address (IPv6 wildcard with IPv4 fallback)
//! - Classify bind failures so callers get consistent diagnostics
//! - Hand the bound socket to the HTTP layer

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::net::address::{bind_first, BindAddress};

/// Error type for bind operations.
#[derive(Debug, Error)]
pub enum BindError {
    /// Another socket already holds the port.
    #[error("Port {port} has been used. Try another port instead.")]
    AddrInUse { port: u16 },

    /// The process may not bind this port.
    #[error("Permission denied. You can't use port {port}.")]
    AccessDenied { port: u16 },

    /// Any other OS-level failure.
    #[error("Failed to bind port {port}: {source}")]
    Io {
        port: u16,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    /// Map an OS error onto the bind taxonomy.
    pub fn classify(err: io::Error, port: u16) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse => BindError::AddrInUse { port },
            io::ErrorKind::PermissionDenied => BindError::AccessDenied { port },
            _ => BindError::Io { port, source: err },
        }
    }

    /// Errno-style code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            BindError::AddrInUse { .. } => "EADDRINUSE",
            BindError::AccessDenied { .. } => "EACCES",
            BindError::Io { source, .. } if source.kind() == io::ErrorKind::AddrNotAvailable => {
                "EADDRNOTAVAIL"
            }
            BindError::Io { .. } => "EIO",
        }
    }
}

/// A bound listener ready to be served.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(addr: &BindAddress) -> Result<Self, BindError> {
        let inner = bind_first(addr).await?;
        let local_addr = inner
            .local_addr()
            .map_err(|e| BindError::classify(e, addr.port()))?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Convert into a std listener (still non-blocking) for axum-server.
    pub fn into_std(self) -> io::Result<std::net::TcpListener> {
        self.inner.into_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_errors() {
        let in_use = BindError::classify(io::Error::from(io::ErrorKind::AddrInUse), 4000);
        assert_eq!(in_use.code(), "EADDRINUSE");
        assert_eq!(
            in_use.to_string(),
            "Port 4000 has been used. Try another port instead."
        );

        let denied = BindError::classify(io::Error::from(io::ErrorKind::PermissionDenied), 80);
        assert_eq!(denied.code(), "EACCES");
        assert_eq!(denied.to_string(), "Permission denied. You can't use port 80.");

        let unavailable =
            BindError::classify(io::Error::from(io::ErrorKind::AddrNotAvailable), 4000);
        assert_eq!(unavailable.code(), "EADDRNOTAVAIL");
    }

    #[tokio::test]
    async fn binds_and_reports_local_address() {
        let addr = BindAddress::new(Some("127.0.0.1".parse().unwrap()), 28392).unwrap();
        let listener = Listener::bind(&addr).await.unwrap();
        assert_eq!(listener.local_addr().port(), 28392);
        let std_listener = listener.into_std().unwrap();
        assert_eq!(std_listener.local_addr().unwrap().port(), 28392);
    }
}
