//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig.server.{ip, port}
//!     → address.rs (range check, throwaway probe bind)
//!     → listener.rs (real bind, error classification)
//!     → tls.rs (optional rustls config)
//!     → Hand off to HTTP layer (axum-server)
//! ```
//!
//! # Design Decisions
//! - Port range is rejected before any socket exists
//! - Probe and real bind share one error classification
//! - TLS is optional and handled transparently

pub mod address;
pub mod listener;
pub mod tls;

pub use address::{check_port, format_address, BindAddress};
pub use listener::{BindError, Listener};
