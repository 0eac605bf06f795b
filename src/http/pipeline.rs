//! Ordered request-handling pipeline.
//!
//! Each stage either answers the request or passes it to `next`. The order
//! is fixed when the pipeline is built; nothing registers at runtime.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

/// One stage of the pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Answer `request`, or hand it on with `next.run(request)`.
    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// The remaining stages after the current one.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Run the rest of the pipeline; an exhausted pipeline answers 404.
    pub async fn run(self, request: Request) -> Response {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.handle(request, Next { rest }).await,
            None => not_found(&request),
        }
    }
}

/// Terminal response when no stage answered.
pub fn not_found(request: &Request) -> Response {
    let body = format!("Cannot {} {}", request.method(), request.uri().path());
    (StatusCode::NOT_FOUND, body).into_response()
}

/// A built, immutable pipeline.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Middleware>]>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Run `request` through every stage in order.
    pub async fn dispatch(&self, request: Request) -> Response {
        Next {
            rest: &self.stages,
        }
        .run(request)
        .await
    }

    /// Stage names, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Collects stages in the order they should run.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    /// Append a stage.
    pub fn stage(mut self, stage: impl Middleware) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append a stage if one was produced.
    pub fn optional(self, stage: Option<impl Middleware>) -> Self {
        match stage {
            Some(stage) => self.stage(stage),
            None => self,
        }
    }

    pub fn build(self) -> Pipeline {
        tracing::debug!(
            stages = ?self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Pipeline built"
        );
        Pipeline {
            stages: self.stages.into(),
        }
    }
}

/// `Location` redirect with the literal `Redirecting` body.
pub fn redirect(status: StatusCode, location: &str) -> Response {
    let mut response = Response::new(Body::from("Redirecting"));
    *response.status_mut() = status;
    if let Ok(value) = location.parse() {
        response
            .headers_mut()
            .insert(axum::http::header::LOCATION, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut response = next.run(request).await;
                response
                    .headers_mut()
                    .append("x-stages", self.0.parse().unwrap());
                response
            })
        }
    }

    struct Answer;

    impl Middleware for Answer {
        fn name(&self) -> &'static str {
            "answer"
        }

        fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                if request.uri().path() == "/hit" {
                    (StatusCode::OK, "hit").into_response()
                } else {
                    next.run(request).await
                }
            })
        }
    }

    fn request(method: Method, path: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let pipeline = Pipeline::builder()
            .stage(Tag("first"))
            .stage(Tag("second"))
            .stage(Answer)
            .build();
        assert_eq!(pipeline.names(), vec!["first", "second", "answer"]);

        let response = pipeline.dispatch(request(Method::GET, "/hit")).await;
        assert_eq!(response.status(), StatusCode::OK);
        // Inner stage appends first on the way out.
        let stages: Vec<_> = response
            .headers()
            .get_all("x-stages")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(stages, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn exhausted_pipeline_is_not_found() {
        let pipeline = Pipeline::builder()
            .optional(None::<Answer>)
            .stage(Answer)
            .build();
        let response = pipeline.dispatch(request(Method::POST, "/miss")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, "Cannot POST /miss");
    }

    #[test]
    fn redirect_sets_location_and_body() {
        let response = redirect(StatusCode::FOUND, "/foo/?x=y");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/foo/?x=y");
    }
}
