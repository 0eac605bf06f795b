//! URL resolution against the route table.
//!
//! # Responsibilities
//! - Decode and normalize request paths
//! - Apply pretty-URL fallbacks (`foo` → `foo/index.html`, `foo` → `foo.html`)
//! - Decide between serving, redirecting, and missing
//!
//! # Design Decisions
//! - Redirect targets are built from the other canonical form, never by
//!   re-resolving the same request, so the two slash rules cannot loop
//! - Canonicalization redirects are permanent (301); folder redirects are
//!   302 unless configured otherwise

use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::routing::negotiate::ContentEncoding;
use crate::site::RouteTable;

/// Characters left alone when re-encoding a path for `Location`.
const LOCATION_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

const INDEX_FILE: &str = "index.html";
const HTML_EXTENSION: &str = ".html";

/// Pretty-URL behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// `false` redirects `foo.html` to `foo`.
    pub trailing_html: bool,
    /// `false` redirects `foo/index.html` to `foo/`.
    pub trailing_index: bool,
    /// Folder redirects use 301 instead of 302.
    pub redirect_permanent: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            trailing_html: true,
            trailing_index: true,
            redirect_permanent: false,
        }
    }
}

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Stream the stored entry at `path`.
    Serve { path: String, content_type: String },
    /// Send the client elsewhere.
    Redirect { location: String, status: StatusCode },
    /// Nothing stored here; delegate to the next handler.
    NotFound,
}

/// Per-request resolution result.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    /// Decoded path, query stripped, in stored form.
    pub normalized_url: String,
    /// Extension of the normalized URL, without the dot.
    pub extension: Option<String>,
    pub resolution: Resolution,
    /// Pre-compressed variant chosen for this response, if any.
    pub encoding: Option<ContentEncoding>,
}

impl ResolvedRequest {
    pub fn is_found(&self) -> bool {
        !matches!(self.resolution, Resolution::NotFound)
    }
}

/// Maps request paths onto route table entries.
#[derive(Clone)]
pub struct Resolver {
    table: Arc<dyn RouteTable>,
    root: String,
    options: ResolveOptions,
}

impl Resolver {
    /// `root` is the mount point (e.g. "/" or "/blog/") used to build redirects.
    pub fn new(table: Arc<dyn RouteTable>, root: impl Into<String>, options: ResolveOptions) -> Self {
        Self {
            table,
            root: root.into(),
            options,
        }
    }

    pub fn table(&self) -> &Arc<dyn RouteTable> {
        &self.table
    }

    /// Resolve a raw (percent-encoded) path relative to the mount root.
    ///
    /// `path` starts with `/`; `query` excludes the leading `?`.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> ResolvedRequest {
        let decoded = decode_path(path);
        let normalized = self.table.format(&decoded);
        let extension = extension_of(&normalized);

        let resolution = if self.table.contains(&normalized) {
            self.resolve_found(&decoded, &normalized, query)
        } else {
            self.resolve_missing(&decoded, &normalized, extension.as_deref(), query)
        };

        ResolvedRequest {
            normalized_url: normalized,
            extension,
            resolution,
            encoding: None,
        }
    }

    fn resolve_found(&self, decoded: &str, normalized: &str, query: Option<&str>) -> Resolution {
        let last_segment = decoded.rsplit('/').next().unwrap_or_default();

        if !self.options.trailing_index && last_segment == INDEX_FILE {
            let dir = &decoded[..decoded.len() - INDEX_FILE.len()];
            return self.redirect(dir, query, StatusCode::MOVED_PERMANENTLY);
        }

        if !self.options.trailing_html
            && last_segment != INDEX_FILE
            && last_segment.ends_with(HTML_EXTENSION)
        {
            let stem = &decoded[..decoded.len() - HTML_EXTENSION.len()];
            return self.redirect(stem, query, StatusCode::MOVED_PERMANENTLY);
        }

        Resolution::Serve {
            path: normalized.to_string(),
            content_type: content_type_for(normalized),
        }
    }

    fn resolve_missing(
        &self,
        decoded: &str,
        normalized: &str,
        extension: Option<&str>,
        query: Option<&str>,
    ) -> Resolution {
        // `foo/bar/` with only `foo/bar.html` stored: drop the slash.
        if decoded.ends_with('/') && decoded.len() > 1 {
            let trimmed = decoded.trim_end_matches('/');
            let page = format!("{}{}", self.table.format(trimmed), HTML_EXTENSION);
            if !trimmed.is_empty() && self.table.contains(&page) {
                return self.redirect(trimmed, query, StatusCode::MOVED_PERMANENTLY);
            }
        }

        if extension.is_some() {
            return Resolution::NotFound;
        }

        // `foo` with `foo/index.html` stored: add the slash.
        let index = format!("{normalized}/{INDEX_FILE}");
        if self.table.contains(&index) {
            let status = if self.options.redirect_permanent {
                StatusCode::MOVED_PERMANENTLY
            } else {
                StatusCode::FOUND
            };
            return self.redirect(&format!("/{normalized}/"), query, status);
        }

        // `foo` with `foo.html` stored: rewrite internally.
        let page = format!("{normalized}{HTML_EXTENSION}");
        if self.table.contains(&page) {
            return Resolution::Serve {
                path: page,
                content_type: "text/html".to_string(),
            };
        }

        Resolution::NotFound
    }

    /// Build a redirect to `path` (decoded, leading `/`) under the mount root.
    fn redirect(&self, path: &str, query: Option<&str>, status: StatusCode) -> Resolution {
        let relative = path.trim_start_matches('/');
        let mut location = format!(
            "{}{}",
            self.root,
            utf8_percent_encode(relative, LOCATION_ENCODE_SET)
        );
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            location.push('?');
            location.push_str(query);
        }
        Resolution::Redirect { location, status }
    }
}

/// Percent-decode a request path; invalid UTF-8 is replaced, not rejected.
pub fn decode_path(path: &str) -> String {
    let without_query = path.split('?').next().unwrap_or_default();
    percent_decode_str(without_query)
        .decode_utf8_lossy()
        .into_owned()
}

/// Extension of the final path segment, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
}

/// Content type derived from a stored path's extension.
pub fn content_type_for(path: &str) -> String {
    if extension_of(path).is_none() {
        return "application/octet-stream".to_string();
    }
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
