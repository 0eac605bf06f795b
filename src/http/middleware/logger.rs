//! Access log stage.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::header::{CONTENT_LENGTH, REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, Version};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::http::pipeline::{Middleware, Next};

/// Access log line presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Dev,
    Tiny,
    Short,
    Common,
    Combined,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "dev" => Ok(LogFormat::Dev),
            "tiny" => Ok(LogFormat::Tiny),
            "short" => Ok(LogFormat::Short),
            "common" => Ok(LogFormat::Common),
            "combined" => Ok(LogFormat::Combined),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl LogFormat {
    /// Parse a configured name; unknown names fall back to `dev`.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|e| {
            tracing::warn!(format = %name, error = %e, "Falling back to dev log format");
            LogFormat::Dev
        })
    }
}

/// Request fields captured before the request moves down the pipeline.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: String,
    pub url: String,
    pub version: Version,
    pub remote_addr: Option<SocketAddr>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestLine {
    pub fn capture(request: &Request) -> Self {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());
        Self {
            method: request.method().to_string(),
            url,
            version: request.version(),
            remote_addr: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            referrer: header(request.headers(), REFERER),
            user_agent: header(request.headers(), USER_AGENT),
        }
    }
}

fn header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Render one access log line.
pub fn format_line(
    format: LogFormat,
    request: &RequestLine,
    status: u16,
    content_length: Option<&str>,
    elapsed_ms: f64,
) -> String {
    let length = content_length.unwrap_or("-");
    let remote = request
        .remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let version = http_version(request.version);

    match format {
        LogFormat::Dev => format!(
            "{} {} {} {:.3} ms - {}",
            request.method, request.url, status, elapsed_ms, length
        ),
        LogFormat::Tiny => format!(
            "{} {} {} {} - {:.3} ms",
            request.method, request.url, status, length, elapsed_ms
        ),
        LogFormat::Short => format!(
            "{} - {} {} HTTP/{} {} {} - {:.3} ms",
            remote, request.method, request.url, version, status, length, elapsed_ms
        ),
        LogFormat::Common | LogFormat::Combined => {
            let date = chrono::Utc::now().format("%d/%b/%Y:%H:%M:%S %z");
            let mut line = format!(
                "{} - - [{}] \"{} {} HTTP/{}\" {} {}",
                remote, date, request.method, request.url, version, status, length
            );
            if format == LogFormat::Combined {
                line.push_str(&format!(
                    " \"{}\" \"{}\"",
                    request.referrer.as_deref().unwrap_or("-"),
                    request.user_agent.as_deref().unwrap_or("-")
                ));
            }
            line
        }
    }
}

/// Emits one log line per response.
#[derive(Debug, Clone)]
pub struct Logger {
    format: LogFormat,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }
}

impl Middleware for Logger {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let line = RequestLine::capture(&request);

            let response = next.run(request).await;

            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            let length = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok());
            let rendered = format_line(
                self.format,
                &line,
                response.status().as_u16(),
                length,
                elapsed_ms,
            );
            tracing::info!(target: "devhost::access", "{rendered}");
            response
        })
    }
}
