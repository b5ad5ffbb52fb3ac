use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

// Shared data types and the traits every storage backend and frontend implements.

/// A saved set of Wi-Fi credentials.
///
/// `ssid` is the identity key: it is compared exactly and case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    pub password: String,
}

impl WifiNetwork {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Password as shown in the saved list: masked, or a marker for open networks.
    pub fn masked_password(&self) -> &'static str {
        if self.password.is_empty() {
            "(no password)"
        } else {
            "••••••••"
        }
    }
}

/// A durable string slot store.
///
/// Implementations must make `put` atomic with respect to `get`: a reader
/// sees either the previous value or the new one, never a partial write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` if it was never written.
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Replaces the value stored under `key`.
    async fn put(&self, key: &str, value: &str) -> crate::Result<()>;
}

/// UI asset provider interface.
#[async_trait]
pub trait UiAssetProvider: Send + Sync {
    /// Retrieves a single UI asset.
    ///
    /// # Arguments
    /// * `path` - The path to the asset (e.g., "index.html", "app.js").
    ///
    /// # Returns
    /// A `Result` containing a tuple of (`Cow<'static, [u8]>`, `String`)
    /// representing the asset's content and its MIME type, or an `Error` if not found.
    async fn get_asset(&self, path: &str) -> crate::Result<(Cow<'static, [u8]>, String)>;
}
