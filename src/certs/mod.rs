//! Locally-trusted certificate provisioning.
//!
//! # Data Flow
//! ```text
//! TlsConfig (cache_dir, mkcert_version, hosts)
//!     → binary.rs (platform artifact name, HEAD size check, download, chmod)
//!     → validate.rs (cached cert covers every host? key matches cert?)
//!     → provisioner.rs (reuse, or run `mkcert -install` for a new pair)
//!     → CertificateBundle { key, cert, root CA }
//!     → net::tls (rustls config for the listener)
//! ```
//!
//! # Design Decisions
//! - The binary is only trusted once fully written; partial downloads go to
//!   a `.part` file first
//! - Any failure here is reported, and the server falls back to HTTP

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub mod binary;
pub mod provisioner;
pub mod validate;

pub use binary::{binary_name, BinaryFetcher};
pub use provisioner::{host_set, CertificateBundle, CertificateProvisioner, ProvisionState, DEFAULT_HOSTS};
pub use validate::{check_pair, PairCheck};

/// Errors from fetching the generator or producing a certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("no certificate generator available for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("download of {url} failed with status {status}")]
    Download { url: String, status: u16 },

    #[error("download of {url} was truncated: expected {expected} bytes, got {actual}")]
    Incomplete {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("certificate generator exited with {0}")]
    Process(ExitStatus),

    #[error("certificate generator did not produce {0}")]
    MissingOutput(PathBuf),

    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },
}
