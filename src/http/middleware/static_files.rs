//! Plain static directory stage.

use std::path::Path;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::http::middleware::route::mount_relative;
use crate::http::pipeline::{Middleware, Next};

/// Serves files from a directory on disk under the mount root.
///
/// Anything the directory does not have continues down the pipeline.
pub struct StaticStage {
    root: String,
    serve_dir: ServeDir,
}

impl StaticStage {
    pub fn new(root: impl Into<String>, dir: &Path) -> Self {
        Self {
            root: root.into(),
            serve_dir: ServeDir::new(dir).append_index_html_on_directories(true),
        }
    }
}

impl Middleware for StaticStage {
    fn name(&self) -> &'static str {
        "static"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if request.method() != Method::GET && request.method() != Method::HEAD {
                return next.run(request).await;
            }
            let Some(relative) = mount_relative(&self.root, request.uri().path()) else {
                return next.run(request).await;
            };
            let uri = match request.uri().query() {
                Some(query) => format!("{relative}?{query}"),
                None => relative,
            };

            let mut probe = Request::builder()
                .method(request.method().clone())
                .uri(uri)
                .body(Body::empty())
                .unwrap_or_default();
            *probe.headers_mut() = request.headers().clone();

            match self.serve_dir.clone().oneshot(probe).await {
                Ok(response) if response.status() != StatusCode::NOT_FOUND => {
                    response.map(Body::new)
                }
                Ok(_) => next.run(request).await,
                Err(e) => match e {},
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::Pipeline;

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_files_and_delegates_misses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "docs").unwrap();

        let p = Pipeline::builder()
            .stage(StaticStage::new("/site/", dir.path()))
            .build();

        let response = p.dispatch(get("/site/robots.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, "User-agent: *");

        let response = p.dispatch(get("/site/docs/")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = p.dispatch(get("/site/nope.txt")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, "Cannot GET /site/nope.txt");

        assert_eq!(p.dispatch(get("/robots.txt")).await.status(), StatusCode::NOT_FOUND);
    }
}
