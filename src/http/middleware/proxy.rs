//! Prefix proxy stage.
//!
//! Requests under the configured path are forwarded to the upstream with
//! the `Host` header rewritten to the upstream authority.

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::http::pipeline::{Middleware, Next};

/// Connection-scoped headers that must not be forwarded.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Drop hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

pub struct ProxyStage {
    prefix: String,
    upstream: Url,
    client: Client<HttpConnector, Body>,
}

impl ProxyStage {
    pub fn new(prefix: impl Into<String>, upstream: Url) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            prefix: prefix.into(),
            upstream,
            client,
        }
    }

    /// Whether `path` falls under the proxied prefix.
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Upstream URI for a request path and query.
    pub fn target(&self, path_and_query: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        let base = self.upstream.path().trim_end_matches('/');
        let origin = self.upstream.origin().ascii_serialization();
        format!("{origin}{base}{path_and_query}").parse()
    }

    fn authority(&self) -> Option<HeaderValue> {
        let host = self.upstream.host_str()?;
        let value = match self.upstream.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        HeaderValue::from_str(&value).ok()
    }

    async fn forward(&self, request: Request) -> Response {
        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let uri = match self.target(&path_and_query) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(path = %path_and_query, error = %e, "Invalid upstream URI");
                return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
            }
        };

        strip_hop_by_hop(&mut parts.headers);
        if let Some(host) = self.authority() {
            parts.headers.insert(header::HOST, host);
        }
        parts.uri = uri.clone();

        tracing::debug!(upstream = %uri, method = %parts.method, "Proxying request");

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %uri, error = %e, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

impl Middleware for ProxyStage {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.matches(request.uri().path()) {
                self.forward(request).await
            } else {
                next.run(request).await
            }
        })
    }
}
