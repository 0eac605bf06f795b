//! Generated-content stage: resolve, negotiate, then stream or replay.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};

use crate::http::pipeline::{redirect, Middleware, Next};
use crate::routing::resolver::decode_path;
use crate::routing::{
    append_vary, negotiate, ContentEncoding, Negotiation, ResponseCache, Resolution, Resolver,
};

/// Serves the route table under the mount root.
pub struct RouteStage {
    root: String,
    resolver: Resolver,
    cache: Arc<ResponseCache>,
    pre_compressed: bool,
}

impl RouteStage {
    pub fn new(resolver: Resolver, root: impl Into<String>, cache: Arc<ResponseCache>, pre_compressed: bool) -> Self {
        Self {
            root: root.into(),
            resolver,
            cache,
            pre_compressed,
        }
    }

    async fn serve(
        &self,
        request: Request,
        next: Next<'_>,
        path: String,
        content_type: String,
        encoding: Option<ContentEncoding>,
    ) -> Response {
        let body = if request.method() == Method::HEAD {
            Body::empty()
        } else {
            match self.open(&path).await {
                Some(Ok(body)) => body,
                Some(Err(e)) => {
                    tracing::error!(path = %path, error = %e, "Failed to read route content");
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
                }
                // Removed by a rebuild since resolution.
                None => return next.run(request).await,
            }
        };

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        if let Some(encoding) = encoding {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.token()));
        }
        if self.pre_compressed {
            append_vary(headers);
        }
        response
    }

    /// Open `path` from the cache or the route table.
    ///
    /// The first chunk is read before returning so a failing source can still
    /// be answered with an error status.
    async fn open(&self, path: &str) -> Option<std::io::Result<Body>> {
        let eligible = self.cache.is_eligible(path);
        if eligible {
            if let Some(bytes) = self.cache.get(path) {
                tracing::trace!(path = %path, "Cache hit");
                return Some(Ok(Body::from(bytes)));
            }
        }

        let mut source = self.resolver.table().get(path)?;
        if eligible {
            source = self.cache.tee(path.to_string(), source);
        }

        Some(match source.next().await {
            None => Ok(Body::empty()),
            Some(Err(e)) => Err(e),
            Some(Ok(first)) => Ok(Body::from_stream(stream::iter([Ok(first)]).chain(source))),
        })
    }

    fn negotiated(&self, request: &Request, path: &str) -> Option<Negotiation> {
        self.pre_compressed
            .then(|| negotiate(accept_encoding(request), path, self.resolver.table().as_ref()))
    }
}

fn accept_encoding(request: &Request) -> &str {
    request
        .headers()
        .get(ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Path relative to `root`, or `None` when the request is outside the mount.
pub fn mount_relative(root: &str, path: &str) -> Option<String> {
    let prefix = root.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path.to_string());
    }
    if path == prefix {
        return Some("/".to_string());
    }
    path.strip_prefix(prefix)
        .filter(|rest| rest.starts_with('/'))
        .map(str::to_string)
}

impl Middleware for RouteStage {
    fn name(&self) -> &'static str {
        "route"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if request.method() != Method::GET && request.method() != Method::HEAD {
                return next.run(request).await;
            }
            let Some(relative) = mount_relative(&self.root, request.uri().path()) else {
                return next.run(request).await;
            };

            let mut resolved = self.resolver.resolve(&relative, request.uri().query());
            tracing::trace!(
                url = %resolved.normalized_url,
                extension = ?resolved.extension,
                found = resolved.is_found(),
                "Resolved request"
            );
            match resolved.resolution.clone() {
                Resolution::Redirect { location, status } => redirect(status, &location),
                Resolution::Serve { path, content_type } => match self.negotiated(&request, &path) {
                    Some(n) if n.encoding.is_some() => {
                        resolved.encoding = n.encoding;
                        self.serve(request, next, n.path, n.content_type, resolved.encoding)
                            .await
                    }
                    _ => self.serve(request, next, path, content_type, None).await,
                },
                Resolution::NotFound if self.pre_compressed => {
                    // Only a compressed sibling may be stored.
                    let decoded = decode_path(&relative);
                    let n = negotiate(
                        accept_encoding(&request),
                        &decoded,
                        self.resolver.table().as_ref(),
                    );
                    if n.encoding.is_some() {
                        resolved.encoding = n.encoding;
                        self.serve(request, next, n.path, n.content_type, resolved.encoding)
                            .await
                    } else {
                        next.run(request).await
                    }
                }
                Resolution::NotFound => next.run(request).await,
            }
        })
    }
}
