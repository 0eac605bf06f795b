//! Checks a cached key/cert pair against the requested hosts.

use std::net::IpAddr;

use rustls_pemfile::certs;
use x509_parser::prelude::*;

use crate::certs::CertificateError;

/// Result of inspecting a cached pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCheck {
    /// Each requested host and whether the certificate covers it.
    pub hosts: Vec<(String, bool)>,
    /// Whether the private key belongs to the certificate.
    pub key_matches: bool,
}

impl PairCheck {
    pub fn covers_all_hosts(&self) -> bool {
        self.hosts.iter().all(|(_, valid)| *valid)
    }

    pub fn is_valid(&self) -> bool {
        self.key_matches && self.covers_all_hosts()
    }
}

fn parse_error(what: &'static str, reason: impl ToString) -> CertificateError {
    CertificateError::Parse {
        what,
        reason: reason.to_string(),
    }
}

/// Inspect a PEM certificate and PEM private key.
pub fn check_pair(cert_pem: &str, key_pem: &str, hosts: &[String]) -> Result<PairCheck, CertificateError> {
    let der = certs(&mut cert_pem.as_bytes())
        .next()
        .ok_or_else(|| parse_error("certificate", "no certificate in PEM"))?
        .map_err(|e| parse_error("certificate", e))?;
    let (_, cert) = X509Certificate::from_der(&der).map_err(|e| parse_error("certificate", e))?;

    let hosts = hosts
        .iter()
        .map(|host| (host.clone(), covers_host(&cert, host)))
        .collect();

    Ok(PairCheck {
        hosts,
        key_matches: key_matches(&cert, key_pem)?,
    })
}

fn key_matches(cert: &X509Certificate<'_>, key_pem: &str) -> Result<bool, CertificateError> {
    let key = rcgen::KeyPair::from_pem(key_pem).map_err(|e| parse_error("private key", e))?;
    let public_der = key.public_key_der();
    let (_, public) =
        SubjectPublicKeyInfo::from_der(&public_der).map_err(|e| parse_error("private key", e))?;
    Ok(public.subject_public_key.data == cert.public_key().subject_public_key.data)
}

/// Whether `cert` is valid for `host` (DNS name or IP literal).
pub fn covers_host(cert: &X509Certificate<'_>, host: &str) -> bool {
    let ip = host.parse::<IpAddr>().ok();
    let mut has_dns_names = false;

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match (name, ip) {
                (GeneralName::DNSName(dns), None) => {
                    has_dns_names = true;
                    if dns_matches(dns, host) {
                        return true;
                    }
                }
                (GeneralName::DNSName(_), Some(_)) => has_dns_names = true,
                (GeneralName::IPAddress(bytes), Some(ip)) => {
                    let matches = match ip {
                        IpAddr::V4(v4) => *bytes == v4.octets().as_slice(),
                        IpAddr::V6(v6) => *bytes == v6.octets().as_slice(),
                    };
                    if matches {
                        return true;
                    }
                }
                _ => {}
            }
        }
    }

    // Common name only counts when there are no DNS SANs.
    if ip.is_none() && !has_dns_names {
        return cert
            .subject()
            .iter_common_name()
            .filter_map(|cn| cn.as_str().ok())
            .any(|cn| dns_matches(cn, host));
    }
    false
}

/// Case-insensitive DNS match with single-label `*.` wildcards.
fn dns_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => host
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == suffix),
        None => pattern == host,
    }
}
