//! Pre-compressed variant negotiation.
//!
//! Brotli is preferred over gzip. A variant is only substituted when the
//! client accepts it and the `.br` / `.gz` sibling is actually stored.

use axum::http::header::{HeaderMap, HeaderValue, VARY};

use crate::routing::resolver::content_type_for;
use crate::site::RouteTable;

/// Encodings with stored sibling variants, in preference order.
const PREFERENCE: [ContentEncoding; 2] = [ContentEncoding::Brotli, ContentEncoding::Gzip];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Brotli,
    Gzip,
}

impl ContentEncoding {
    /// Token used in `Accept-Encoding` / `Content-Encoding`.
    pub fn token(&self) -> &'static str {
        match self {
            ContentEncoding::Brotli => "br",
            ContentEncoding::Gzip => "gzip",
        }
    }

    /// Suffix of the stored sibling.
    pub fn suffix(&self) -> &'static str {
        match self {
            ContentEncoding::Brotli => ".br",
            ContentEncoding::Gzip => ".gz",
        }
    }
}

/// Outcome of negotiating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// Encoding of the substituted variant, `None` when serving the original.
    pub encoding: Option<ContentEncoding>,
    /// Stored path to open (the variant when one was chosen).
    pub path: String,
    /// Content type of the uncompressed original, with `charset=utf-8` for
    /// textual types.
    pub content_type: String,
}

/// Choose a pre-compressed variant for `path`.
///
/// `path` may be a request path (`/foo/`) or a stored path (`foo/index.html`);
/// directory-style paths target their `index.html`.
pub fn negotiate(accept_encoding: &str, path: &str, table: &dyn RouteTable) -> Negotiation {
    let target = if path.is_empty() || path.ends_with('/') {
        format!("{path}index.html")
    } else {
        path.to_string()
    };
    let original = table.format(&target);
    let content_type = with_charset(content_type_for(&original));

    for encoding in PREFERENCE {
        if !accepts(accept_encoding, encoding.token()) {
            continue;
        }
        let variant = format!("{original}{}", encoding.suffix());
        if table.contains(&variant) {
            return Negotiation {
                encoding: Some(encoding),
                path: variant,
                content_type,
            };
        }
    }

    Negotiation {
        encoding: None,
        path: original,
        content_type,
    }
}

/// Append `; charset=utf-8` to textual content types.
pub fn with_charset(content_type: String) -> String {
    let textual = content_type.starts_with("text/")
        || content_type.ends_with("javascript")
        || content_type.ends_with("json")
        || content_type.ends_with("+xml")
        || content_type == "application/xml";
    if textual && !content_type.contains("charset") {
        format!("{content_type}; charset=utf-8")
    } else {
        content_type
    }
}

/// Whether an `Accept-Encoding` value lists `token` with a non-zero weight.
pub fn accepts(accept_encoding: &str, token: &str) -> bool {
    accept_encoding.split(',').any(|entry| {
        let mut parts = entry.split(';');
        let name = parts.next().unwrap_or_default().trim();
        if !name.eq_ignore_ascii_case(token) {
            return false;
        }
        !parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        })
    })
}

/// Make sure `Vary` lists `Accept-Encoding` exactly once, keeping other tokens.
pub fn append_vary(headers: &mut HeaderMap) {
    let existing = headers
        .get_all(VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    if existing
        .iter()
        .any(|token| token == "*" || token.eq_ignore_ascii_case("accept-encoding"))
    {
        return;
    }

    let value = if existing.is_empty() {
        "Accept-Encoding".to_string()
    } else {
        format!("{}, Accept-Encoding", existing.join(", "))
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(VARY, value);
    }
}
