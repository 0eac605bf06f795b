//! Generated-site subsystem.
//!
//! # Data Flow
//! ```text
//! SiteGenerator (directory walk, or any external build)
//!     → RouteMap
//!     → table.rs (MemoryRouteTable::replace, atomic swap)
//!     → events.rs (RebuildNotifier::notify)
//!     → subscribers (response cache reset)
//!
//! Watch mode:
//!     watcher.rs detects change
//!     → debounce
//!     → rebuild → swap → notify
//! ```
//!
//! # Design Decisions
//! - The table is replaced, never mutated, so readers see old or new
//! - A failed rebuild keeps serving the previous table

pub mod events;
pub mod generator;
pub mod table;
pub mod watcher;

pub use events::RebuildNotifier;
pub use generator::{rebuild, DirectoryGenerator, SiteGenerator};
pub use table::{
    format_path, route_map, ContentSource, ContentStream, FileSource, MemoryRouteTable, RouteMap,
    RouteTable,
};
pub use watcher::SiteWatcher;
