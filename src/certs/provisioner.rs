//! Certificate provisioning state machine.
//!
//! ```text
//! NoBinary → BinaryCached → NoCertificate ─────────→ CertificateValid
//!                               ↑                          ↑
//!                               └── CertificateInvalid ────┘ (regenerate)
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::certs::binary::BinaryFetcher;
use crate::certs::validate::check_pair;
use crate::certs::CertificateError;
use crate::config::TlsConfig;

/// Hosts every issued certificate covers.
pub const DEFAULT_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

const KEY_FILE: &str = "key.pem";
const CERT_FILE: &str = "cert.pem";
const ROOT_CA_FILE: &str = "rootCA.pem";

/// Default hosts followed by `extra`, without duplicates.
pub fn host_set(extra: &[String]) -> Vec<String> {
    let mut hosts: Vec<String> = DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect();
    for host in extra {
        let host = host.trim();
        if !host.is_empty() && !hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            hosts.push(host.to_string());
        }
    }
    hosts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    NoBinary,
    BinaryCached,
    NoCertificate,
    CertificateInvalid,
    CertificateValid,
}

/// Paths of a ready-to-use certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    pub key: PathBuf,
    pub cert: PathBuf,
    pub root_ca: PathBuf,
    pub binary: PathBuf,
}

/// Produces a locally-trusted key/cert pair, reusing the cached one while it
/// still fits the requested hosts.
#[derive(Debug, Clone)]
pub struct CertificateProvisioner {
    fetcher: BinaryFetcher,
    key_path: PathBuf,
    cert_path: PathBuf,
}

impl CertificateProvisioner {
    pub fn new(fetcher: BinaryFetcher) -> Self {
        let key_path = fetcher.cache_dir().join(KEY_FILE);
        let cert_path = fetcher.cache_dir().join(CERT_FILE);
        Self {
            fetcher,
            key_path,
            cert_path,
        }
    }

    pub fn from_config(tls: &TlsConfig) -> Self {
        Self::new(BinaryFetcher::from_config(tls))
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    /// Fetch the generator if needed, then reuse or issue a certificate.
    pub async fn ensure_certificate(&self, extra_hosts: &[String]) -> Result<CertificateBundle, CertificateError> {
        tracing::debug!(state = ?ProvisionState::NoBinary, "Provisioning certificate");
        let binary = self.fetcher.ensure_binary().await?;
        tracing::debug!(state = ?ProvisionState::BinaryCached, binary = ?binary);
        self.provision_with(&binary, extra_hosts).await
    }

    /// Reuse or issue a certificate with an already available generator.
    pub async fn provision_with(&self, binary: &Path, extra_hosts: &[String]) -> Result<CertificateBundle, CertificateError> {
        let hosts = host_set(extra_hosts);
        let state = self.inspect(&hosts).await;
        tracing::debug!(state = ?state, "Cached certificate inspected");

        if state != ProvisionState::CertificateValid {
            tokio::fs::create_dir_all(self.fetcher.cache_dir()).await?;
            self.generate(binary, &hosts).await?;
            tracing::debug!(state = ?ProvisionState::CertificateValid, "Certificate issued");
        } else {
            tracing::info!(cert = ?self.cert_path, "Reusing cached certificate");
        }

        Ok(CertificateBundle {
            key: self.key_path.clone(),
            cert: self.cert_path.clone(),
            root_ca: ca_root(binary).await?,
            binary: binary.to_path_buf(),
        })
    }

    /// Classify the cached pair against `hosts`, logging each host.
    pub async fn inspect(&self, hosts: &[String]) -> ProvisionState {
        let (cert, key) = match (
            tokio::fs::read_to_string(&self.cert_path).await,
            tokio::fs::read_to_string(&self.key_path).await,
        ) {
            (Ok(cert), Ok(key)) => (cert, key),
            _ => return ProvisionState::NoCertificate,
        };

        match check_pair(&cert, &key, hosts) {
            Ok(check) => {
                for (host, valid) in &check.hosts {
                    if *valid {
                        tracing::info!(host = %host, "Certificate is valid for host");
                    } else {
                        tracing::warn!(host = %host, "Certificate is not valid for host");
                    }
                }
                if !check.key_matches {
                    tracing::warn!("Certificate does not match the private key");
                }
                if check.is_valid() {
                    ProvisionState::CertificateValid
                } else {
                    ProvisionState::CertificateInvalid
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cached certificate is unreadable");
                ProvisionState::CertificateInvalid
            }
        }
    }

    async fn generate(&self, binary: &Path, hosts: &[String]) -> Result<(), CertificateError> {
        tracing::info!(hosts = ?hosts, "Generating locally-trusted certificate");
        let output = Command::new(binary)
            .arg("-install")
            .arg("-key-file")
            .arg(&self.key_path)
            .arg("-cert-file")
            .arg(&self.cert_path)
            .args(hosts)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            tracing::warn!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Certificate generator failed"
            );
            return Err(CertificateError::Process(output.status));
        }

        for path in [&self.key_path, &self.cert_path] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(CertificateError::MissingOutput(path.clone()));
            }
        }
        Ok(())
    }
}

/// Root CA certificate path reported by the generator.
pub async fn ca_root(binary: &Path) -> Result<PathBuf, CertificateError> {
    let output = Command::new(binary)
        .arg("-CAROOT")
        .stdin(Stdio::null())
        .output()
        .await?;
    if !output.status.success() {
        return Err(CertificateError::Process(output.status));
    }
    let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if dir.is_empty() {
        return Err(CertificateError::Parse {
            what: "CA root",
            reason: "generator printed nothing".to_string(),
        });
    }
    Ok(PathBuf::from(dir).join(ROOT_CA_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_set_unions_and_dedupes() {
        assert_eq!(host_set(&[]), vec!["localhost", "127.0.0.1", "::1"]);
        let extra = vec!["dev.test".to_string(), "LOCALHOST".to_string(), "dev.test".to_string()];
        assert_eq!(
            host_set(&extra),
            vec!["localhost", "127.0.0.1", "::1", "dev.test"]
        );
    }

    #[tokio::test]
    async fn missing_pair_is_no_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = CertificateProvisioner::new(BinaryFetcher::new(dir.path(), "v1.4.4", "http://127.0.0.1:9"));
        assert_eq!(
            provisioner.inspect(&host_set(&[])).await,
            ProvisionState::NoCertificate
        );
    }

    #[cfg(unix)]
    mod generator {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        struct Fixture {
            dir: tempfile::TempDir,
            binary: PathBuf,
            log: PathBuf,
        }

        fn write_pair(dir: &Path, prefix: &str, hosts: &[&str]) -> (PathBuf, PathBuf) {
            let key = rcgen::KeyPair::generate().unwrap();
            let cert = rcgen::CertificateParams::new(
                hosts.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
            )
            .unwrap()
            .self_signed(&key)
            .unwrap();
            let key_path = dir.join(format!("{prefix}-key.pem"));
            let cert_path = dir.join(format!("{prefix}-cert.pem"));
            std::fs::write(&key_path, key.serialize_pem()).unwrap();
            std::fs::write(&cert_path, cert.pem()).unwrap();
            (key_path, cert_path)
        }

        /// A stand-in generator that copies a prepared pair into place.
        fn script(dir: &Path, key: &Path, cert: &Path, log: &Path, exit_code: i32) -> String {
            format!(
                "#!/bin/sh\n\
                 if [ \"$1\" = \"-CAROOT\" ]; then echo \"{ca}\"; exit 0; fi\n\
                 echo \"$@\" >> \"{log}\"\n\
                 if [ {exit_code} -ne 0 ]; then exit {exit_code}; fi\n\
                 cp \"{key}\" \"$3\"\n\
                 cp \"{cert}\" \"$5\"\n",
                ca = dir.join("ca").display(),
                log = log.display(),
                key = key.display(),
                cert = cert.display(),
            )
        }

        fn fixture(exit_code: i32) -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let (key, cert) = write_pair(dir.path(), "issued", &["localhost", "127.0.0.1", "::1", "dev.test"]);
            let log = dir.path().join("calls.log");
            let binary = dir.path().join("mkcert");
            std::fs::write(&binary, script(dir.path(), &key, &cert, &log, exit_code)).unwrap();
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
            Fixture { dir, binary, log }
        }

        fn calls(fixture: &Fixture) -> Vec<String> {
            std::fs::read_to_string(&fixture.log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn provisioner(fixture: &Fixture) -> CertificateProvisioner {
            let cache = fixture.dir.path().join("cache");
            CertificateProvisioner::new(BinaryFetcher::new(cache, "v1.4.4", "http://127.0.0.1:9"))
        }

        #[tokio::test]
        async fn issues_then_reuses() {
            let fixture = fixture(0);
            let provisioner = provisioner(&fixture);
            let extra = vec!["dev.test".to_string()];

            let bundle = provisioner.provision_with(&fixture.binary, &extra).await.unwrap();
            assert!(bundle.key.exists());
            assert!(bundle.cert.exists());
            assert_eq!(bundle.root_ca, fixture.dir.path().join("ca").join("rootCA.pem"));

            let log = calls(&fixture);
            assert_eq!(log.len(), 1);
            assert!(log[0].starts_with("-install -key-file "));
            assert!(log[0].ends_with("localhost 127.0.0.1 ::1 dev.test"));

            assert_eq!(
                provisioner.inspect(&host_set(&extra)).await,
                ProvisionState::CertificateValid
            );
            provisioner.provision_with(&fixture.binary, &extra).await.unwrap();
            assert_eq!(calls(&fixture).len(), 1);
        }

        #[tokio::test]
        async fn regenerates_mismatched_pair() {
            let fixture = fixture(0);
            let provisioner = provisioner(&fixture);
            let cache = fixture.dir.path().join("cache");
            std::fs::create_dir_all(&cache).unwrap();

            let (_, cert_a) = write_pair(fixture.dir.path(), "a", &["localhost", "127.0.0.1", "::1"]);
            let (key_b, _) = write_pair(fixture.dir.path(), "b", &["localhost", "127.0.0.1", "::1"]);
            std::fs::copy(cert_a, provisioner.cert_path()).unwrap();
            std::fs::copy(key_b, provisioner.key_path()).unwrap();

            assert_eq!(
                provisioner.inspect(&host_set(&[])).await,
                ProvisionState::CertificateInvalid
            );
            provisioner.provision_with(&fixture.binary, &[]).await.unwrap();
            assert_eq!(calls(&fixture).len(), 1);
            assert_eq!(
                provisioner.inspect(&host_set(&[])).await,
                ProvisionState::CertificateValid
            );
        }

        #[tokio::test]
        async fn new_host_forces_regeneration() {
            let fixture = fixture(0);
            let provisioner = provisioner(&fixture);
            provisioner.provision_with(&fixture.binary, &[]).await.unwrap();

            let extra = vec!["other.test".to_string()];
            assert_eq!(
                provisioner.inspect(&host_set(&extra)).await,
                ProvisionState::CertificateInvalid
            );
        }

        #[tokio::test]
        async fn failing_generator_is_a_process_error() {
            let fixture = fixture(3);
            let provisioner = provisioner(&fixture);
            let err = provisioner.provision_with(&fixture.binary, &[]).await.unwrap_err();
            assert!(matches!(err, CertificateError::Process(_)));
        }

        #[tokio::test]
        async fn downloads_generator_before_issuing() {
            use axum::http::header;
            use axum::Router;

            let fixture = fixture(0);
            let payload = std::fs::read(&fixture.binary).unwrap();
            let app = Router::new().fallback(move || {
                let payload = payload.clone();
                async move { ([(header::CONTENT_LENGTH, payload.len().to_string())], payload) }
            });
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

            let cache = fixture.dir.path().join("cache");
            let provisioner = CertificateProvisioner::new(BinaryFetcher::new(
                &cache,
                "v1.4.4",
                format!("http://{addr}"),
            ));
            let bundle = provisioner.ensure_certificate(&[]).await.unwrap();
            assert!(bundle.binary.starts_with(&cache));
            assert!(bundle.cert.exists());
            assert_eq!(calls(&fixture).len(), 1);
        }
    }
}
