//! Generator binary download and cache.

use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_LENGTH;
use tokio::io::AsyncWriteExt;

use crate::certs::CertificateError;
use crate::config::TlsConfig;

/// Release artifact name for a platform, e.g. `mkcert-v1.4.4-linux-amd64`.
pub fn binary_name(version: &str, os: &str, arch: &str) -> Result<String, CertificateError> {
    let platform = match os {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        _ => {
            return Err(CertificateError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    let arch = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    let suffix = if platform == "windows" { ".exe" } else { "" };
    Ok(format!("mkcert-{version}-{platform}-{arch}{suffix}"))
}

/// Keeps one copy of the generator binary in the cache directory.
#[derive(Debug, Clone)]
pub struct BinaryFetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
    version: String,
    download_base: String,
}

impl BinaryFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>, version: impl Into<String>, download_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
            version: version.into(),
            download_base: download_base.into(),
        }
    }

    pub fn from_config(tls: &TlsConfig) -> Self {
        Self::new(&tls.cache_dir, &tls.mkcert_version, &tls.download_base)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Artifact name for the running platform.
    pub fn name(&self) -> Result<String, CertificateError> {
        binary_name(&self.version, std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.download_base.trim_end_matches('/'),
            self.version,
            name
        )
    }

    /// Return the cached binary, downloading it when missing or stale.
    ///
    /// A cached copy is reused when its size equals the advertised
    /// `Content-Length` of the remote artifact.
    pub async fn ensure_binary(&self) -> Result<PathBuf, CertificateError> {
        let name = self.name()?;
        let url = self.url(&name);
        let path = self.cache_dir.join(&name);

        let head = self.client.head(&url).send().await?;
        if !head.status().is_success() {
            return Err(CertificateError::Download {
                url,
                status: head.status().as_u16(),
            });
        }
        let remote_size = head
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        match tokio::fs::metadata(&path).await {
            Ok(meta) if Some(meta.len()) == remote_size => {
                tracing::info!(path = ?path, "Certificate generator is up to date");
                return Ok(path);
            }
            Ok(meta) => {
                tracing::info!(
                    path = ?path,
                    local = meta.len(),
                    remote = ?remote_size,
                    "Certificate generator size mismatch, downloading again"
                );
            }
            Err(_) => tracing::info!(url = %url, "Downloading certificate generator"),
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        self.download(&url, &path, remote_size).await?;
        Ok(path)
    }

    async fn download(&self, url: &str, path: &Path, expected: Option<u64>) -> Result<(), CertificateError> {
        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CertificateError::Download {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let partial = path.with_file_name(format!(
            "{}.part",
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        ));
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(expected) = expected.filter(|e| *e != written) {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(CertificateError::Incomplete {
                url: url.to_string(),
                expected,
                actual: written,
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o755)).await?;
        }
        tokio::fs::rename(&partial, path).await?;

        tracing::info!(path = ?path, bytes = written, "Certificate generator downloaded");
        Ok(())
    }
}
