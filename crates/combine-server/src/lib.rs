//! Local HTTP server for Combine build output.
//!
//! Serves the output directory as a web server would: directory requests
//! resolve to their `index.html`, and missing paths return 404 (with the
//! site's own `404.html` when it has one).
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run() -> Result<(), combine_server::ServerError> {
//! use std::path::PathBuf;
//! use combine_server::{ServerConfig, run_server};
//!
//! let config = ServerConfig {
//!     root: PathBuf::from("output"),
//!     ..ServerConfig::default()
//! };
//! run_server(config, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod app;
mod headers;

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Default port for `combine work`.
pub const DEFAULT_PORT: u16 = 8000;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: IpAddr,
    pub port: u16,
    /// Directory to serve.
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            root: PathBuf::from("output"),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Error returned when the server cannot start or stops unexpectedly.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Serve `config.root` until `shutdown` completes.
pub async fn run_server<F>(config: ServerConfig, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.addr();
    let app = app::create_router(&config.root);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(address = %addr, root = %config.root.display(), "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Server stopped");
    Ok(())
}
