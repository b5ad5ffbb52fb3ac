//! Saved network persistence.
//!
//! The whole list lives in one slot of a [`KeyValueStore`] as a JSON array.
//! It is read once at startup and overwritten wholesale on every change.

pub mod file;
pub mod memory;

use crate::Result;
use crate::traits::{KeyValueStore, WifiNetwork};
use tracing::{debug, warn};

/// Slot name used when the configuration does not override it.
pub const DEFAULT_KEY: &str = "saved_networks";

/// Reads and writes the saved network list through a key-value backend.
#[derive(Debug)]
pub struct NetworkStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> NetworkStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, DEFAULT_KEY)
    }

    pub fn with_key(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Loads the saved list.
    ///
    /// A never-written slot reads as `[]`. Read and parse failures are
    /// logged and yield an empty list.
    pub async fn load(&self) -> Vec<WifiNetwork> {
        let serialized = match self.backend.get(&self.key).await {
            Ok(value) => value.unwrap_or_else(|| "[]".to_string()),
            Err(e) => {
                warn!(key = %self.key, "Failed to read saved networks: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<WifiNetwork>>(&serialized) {
            Ok(networks) => {
                debug!(key = %self.key, count = networks.len(), "Loaded saved networks");
                networks
            }
            Err(e) => {
                warn!(key = %self.key, "Discarding malformed saved networks: {}", e);
                Vec::new()
            }
        }
    }

    /// Replaces the saved list.
    pub async fn save(&self, networks: &[WifiNetwork]) -> Result<()> {
        let serialized = serde_json::to_string(networks)?;
        self.backend.put(&self.key, &serialized).await?;
        debug!(key = %self.key, count = networks.len(), "Saved networks");
        Ok(())
    }
}
