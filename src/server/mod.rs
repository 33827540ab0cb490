//! HTTP surface of the worker: health probe and manual drain trigger.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Settings;
use crate::services::StorageBackend;
use crate::worker::Worker;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
    /// Bearer token `POST /trigger` requires. `None` rejects every trigger.
    pub service_key: Option<Arc<str>>,
    /// Local object store root, served under `/storage`.
    pub storage_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(worker: Arc<Worker>, settings: &Settings) -> Self {
        let storage_dir = match settings.storage.backend {
            StorageBackend::Local => Some(settings.storage.local_dir(&settings.data_dir)),
            StorageBackend::Http => None,
        };

        Self {
            worker,
            service_key: settings
                .service_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(Arc::from),
            storage_dir,
        }
    }
}

/// Serve until `shutdown` turns true.
pub async fn serve(
    state: AppState,
    bind: &str,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    if state.service_key.is_none() {
        tracing::warn!("No service key configured, POST /trigger will reject every request");
    }
    let app = create_router(state);

    let addr: SocketAddr = bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
