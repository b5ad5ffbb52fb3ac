use crate::traits::UiAssetProvider;
use std::sync::Arc;

/// Picks the UI asset provider selected at compile time.
pub fn create_frontend() -> Arc<dyn UiAssetProvider> {
    #[cfg(feature = "frontend_disk")]
    {
        tracing::info!("💿 Frontend: Disk Provider selected (for local development)");
        Arc::new(crate::frontends::provider_disk::DiskFrontend::new())
    }
    #[cfg(not(feature = "frontend_disk"))]
    {
        tracing::info!("📦 Frontend: Embed Provider selected");
        Arc::new(crate::frontends::provider_embed::EmbedFrontend::new())
    }
}
