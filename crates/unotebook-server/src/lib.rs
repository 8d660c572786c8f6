//! unotebook HTTP server.
//!
//! Serves the notebook UI, persists notebook documents and runs cells,
//! streaming each cell's output back on the response body.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Routes**: Method+path dispatch onto the cell engine and storage
//! - **Channel**: Bridge from a blocking cell run to a streamed body
//! - **Vfs**: Flat file storage for documents and UI assets

pub mod channel;
pub mod error;
pub mod routes;
pub mod vfs;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use unotebook_core::{CellEngine, OutputStream, RhaiEvaluator};

pub use channel::HttpChannel;
pub use error::{ServerError, ServerResult};
pub use routes::{AppState, FileEntry, RunCellRequest, create_router};
pub use vfs::{DirFs, MemFs, Vfs};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory holding notebook documents.
    pub notebook_dir: PathBuf,
    /// Directory holding the UI assets.
    pub assets_dir: PathBuf,
    /// Operation budget per script run; zero means unlimited.
    pub max_operations: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 12345,
            notebook_dir: PathBuf::from("."),
            assets_dir: PathBuf::from("."),
            max_operations: 0,
        }
    }
}

impl AppState {
    /// Build state backed by the directories in `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let output = OutputStream::stdout();
        let evaluator = RhaiEvaluator::with_max_operations(output.clone(), config.max_operations);
        Self {
            engine: Arc::new(CellEngine::new(evaluator, output)),
            store: Arc::new(DirFs::new(&config.notebook_dir)),
            assets: Arc::new(DirFs::new(&config.assets_dir)),
        }
    }
}

/// Start the unotebook server and run until Ctrl+C.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let state = Arc::new(AppState::from_config(&config));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::Io {
            path: PathBuf::new(),
            message: format!("Invalid address: {}:{}", config.host, config.port),
        })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving on http://{}", addr);
    tracing::info!("Notebooks in {}", config.notebook_dir.display());

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 12345);
        assert_eq!(config.max_operations, 0);
    }
}
