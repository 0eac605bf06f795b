//! devhost: a local development server for generated static sites.
//!
//! ```text
//!   flags + devhost.toml ──▶ ServerConfig ──▶ Server::start
//!                                                 │
//!        ┌──────────── port check ◀───────────────┤
//!        │             TLS / mkcert provisioning ◀┤
//!        │             pipeline wiring ◀──────────┤
//!        │             content load / watch ◀─────┤
//!        ▼                                        │
//!   ListeningServer ◀──────────── bind + serve ◀──┘
//!        │
//!        └── Ctrl+C / SIGTERM ──▶ close()
//! ```

use std::process::ExitCode;

use clap::Parser;

use devhost::cli::Args;
use devhost::http::Server;
use devhost::lifecycle::{signals, Shutdown};
use devhost::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(logging::DEFAULT_FILTER);

    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(code = e.code(), "{e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(
        port = config.server.port,
        root = %config.server.root,
        source = ?config.server.source_dir,
        "Configuration loaded"
    );

    // Start errors are logged by the bootstrap itself.
    let server = match Server::new(config).start().await {
        Ok(server) => server,
        Err(_) => return ExitCode::FAILURE,
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    match server.run_until(shutdown.subscribe()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server stopped unexpectedly");
            ExitCode::FAILURE
        }
    }
}
