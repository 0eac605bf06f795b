//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (axum-server)
//!     → tower layers: X-Powered-By header → gzip compression → trace
//!     → pipeline.rs (ordered stages, first answer wins)
//!         logger → route → static → redirect → proxy
//!     → terminal 404 `Cannot <METHOD> <path>`
//! ```
//!
//! # Design Decisions
//! - Stages are fixed at startup; each is mounted only when configured
//! - A stage that cannot answer hands the untouched request to the next

pub mod middleware;
pub mod pipeline;
pub mod server;

pub use pipeline::{Middleware, Next, Pipeline};
pub use server::{ListeningServer, Server, StartError};
