//! Startup phases.
//!
//! ```text
//! Idle → PortChecking → MiddlewareWiring → ContentLoading → Listening → Serving
//!                                                              │
//!                                                              └→ Failed
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Generate once and serve that.
    Static,
    /// Generate, then regenerate on source changes.
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PortChecking,
    MiddlewareWiring,
    ContentLoading(ContentMode),
    Listening,
    Serving,
    Failed(&'static str),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::PortChecking => f.write_str("port-checking"),
            Phase::MiddlewareWiring => f.write_str("middleware-wiring"),
            Phase::ContentLoading(ContentMode::Static) => f.write_str("content-loading(static)"),
            Phase::ContentLoading(ContentMode::Watch) => f.write_str("content-loading(watch)"),
            Phase::Listening => f.write_str("listening"),
            Phase::Serving => f.write_str("serving"),
            Phase::Failed(code) => write!(f, "failed({code})"),
        }
    }
}

/// Record a phase transition.
pub fn enter(phase: Phase) -> Phase {
    tracing::debug!(phase = %phase, "Startup phase");
    phase
}
