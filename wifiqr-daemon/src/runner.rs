use anyhow::Context;
use std::sync::Arc;
use wifiqr_core::{
    config::{AppConfig, StorageBackend},
    state::StateController,
    store::{NetworkStore, file::FileStore, memory::MemoryStore},
    traits::{KeyValueStore, UiAssetProvider},
    web_server,
};

/// Builds the configured store, loads saved networks and serves the web UI
/// until the server stops.
pub async fn run(config: AppConfig, frontend: Arc<dyn UiAssetProvider>) -> anyhow::Result<()> {
    match config.storage.backend {
        StorageBackend::File => {
            tracing::info!(path = %config.storage.path.display(), "💾 Storage: file");
            let backend = FileStore::new(config.storage.path.clone());
            serve(config, backend, frontend).await
        }
        StorageBackend::Memory => {
            tracing::warn!("🧠 Storage: memory, saved networks are lost on exit");
            serve(config, MemoryStore::new(), frontend).await
        }
    }
}

async fn serve<S: KeyValueStore + 'static>(
    config: AppConfig,
    backend: S,
    frontend: Arc<dyn UiAssetProvider>,
) -> anyhow::Result<()> {
    let store = NetworkStore::with_key(backend, config.storage.key.clone());
    let controller = StateController::new(store, config.qr);

    // Saves must start from the stored list, so the listener opens only after the load.
    controller
        .startup_load()
        .await
        .context("failed to load saved networks")?;

    web_server::run_server(config.bind_addr, controller, frontend).await?;
    Ok(())
}
