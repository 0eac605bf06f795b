//! Pipeline stages.
//!
//! Mounted in this order by the server, each only when its feature is on:
//! logger → route → static → redirect → proxy. The response header and
//! on-the-fly compression run as tower layers around the whole pipeline.

pub mod logger;
pub mod proxy;
pub mod redirect;
pub mod route;
pub mod static_files;

pub use logger::{LogFormat, Logger};
pub use proxy::ProxyStage;
pub use redirect::RootRedirect;
pub use route::RouteStage;
pub use static_files::StaticStage;
