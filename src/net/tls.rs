//! Certificate files to rustls.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Build a rustls server config from a PEM certificate chain and key.
///
/// Missing files are reported as `NotFound` naming the file, instead of the
/// bare OS error rustls would surface.
pub async fn load_tls_config(cert: &Path, key: &Path) -> io::Result<RustlsConfig> {
    for (what, path) in [("certificate", cert), ("private key", key)] {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{what} file not found: {}", path.display()),
            ));
        }
    }
    RustlsConfig::from_pem_file(cert, key).await
}
