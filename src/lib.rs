//! Local development server for generated static sites.

pub mod certs;
pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod site;

pub use config::ServerConfig;
pub use http::{ListeningServer, Server, StartError};
pub use lifecycle::Shutdown;
