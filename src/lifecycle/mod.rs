//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Phase transitions logged by the server bootstrap
//!
//! Browser (browser.rs):
//!     Server started + `open` → platform opener with the served URL
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → shutdown.rs broadcast → ListeningServer::close
//! ```
//!
//! # Design Decisions
//! - Closing is idempotent and also runs on drop
//! - Failing to open a browser is logged, never fatal

pub mod browser;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{ContentMode, Phase};
