//! Content routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming GET/HEAD (path relative to the mount root, query)
//!     → resolver.rs (decode, normalize, pretty-URL fallbacks)
//!     → Serve(path) | Redirect(location) | NotFound
//!     → negotiate.rs (swap in a stored .br/.gz sibling)
//!     → cache.rs (replay or tee the body)
//! ```
//!
//! # Design Decisions
//! - Resolution is a pure function of the route table snapshot
//! - A miss is a value, not an error; the pipeline delegates onward
//! - The cache is the only mutable state on the hot path

pub mod cache;
pub mod negotiate;
pub mod resolver;

pub use cache::ResponseCache;
pub use negotiate::{append_vary, negotiate, ContentEncoding, Negotiation};
pub use resolver::{ResolveOptions, Resolution, ResolvedRequest, Resolver};
