//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every subsystem emits tracing events with structured fields
//!     → logging.rs (EnvFilter + fmt layer, installed by the binary)
//!     → stdout
//!
//! Access log stage (http::middleware::logger)
//!     → one event per response under target `devhost::access`
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber
//! - `RUST_LOG` wins over the built-in default filter

pub mod logging;
