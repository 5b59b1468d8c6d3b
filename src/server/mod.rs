//! HTTP surface of the merge service.
//!
//! ```text
//! POST /merge        multipart upload  ─┐
//! POST /merge-json   URL / base64      ─┤→ params → loader → compositor → store
//! GET  /outputs/:f   stored result     ←┘
//! ```

mod handlers;
pub mod params;
pub mod response;
pub mod storage;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::image::Loader;

pub use handlers::MergeJsonBody;
pub use storage::{spawn_cleanup, OutputStore, StoredOutput};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub loader: Loader,
    pub store: OutputStore,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig, loader: Loader, store: OutputStore) -> Self {
        Self {
            config: Arc::new(config),
            loader,
            store,
        }
    }

    /// Public URL of a stored output.
    #[must_use]
    pub fn output_url(&self, filename: &str) -> String {
        match &self.config.public_base_url {
            Some(base) => format!("{}/outputs/{filename}", base.trim_end_matches('/')),
            None => format!("/outputs/{filename}"),
        }
    }
}

/// Build the router with CORS, request tracing and the upload size limit.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/merge", post(handlers::merge_upload))
        .route("/merge-json", post(handlers::merge_json))
        .route("/outputs/:filename", get(handlers::get_output))
        .route("/cleanup", delete(handlers::cleanup))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{addr}");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(err) => {
            tracing::warn!("Failed to listen for Ctrl-C, running until killed: {err}");
            std::future::pending::<()>().await;
        }
    }
}
