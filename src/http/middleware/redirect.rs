//! Sends `/` to the mount root when the site is not served at `/`.

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::http::pipeline::{redirect, Middleware, Next};

pub struct RootRedirect {
    root: String,
}

impl RootRedirect {
    /// `None` when `root` is `/`, since there is nothing to redirect to.
    pub fn for_root(root: &str) -> Option<Self> {
        (root != "/").then(|| Self {
            root: root.to_string(),
        })
    }
}

impl Middleware for RootRedirect {
    fn name(&self) -> &'static str {
        "redirect"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let is_bare_root = request.uri().path() == "/" && request.uri().query().is_none();
            if request.method() == Method::GET && is_bare_root {
                return redirect(StatusCode::FOUND, &self.root);
            }
            next.run(request).await
        })
    }
}
