use crate::formatter::AuthType;
use crate::renderer::{DEFAULT_QR_SIZE, MAX_QR_SIZE};
use crate::state::QrGenerator;
use crate::store::DEFAULT_KEY;
use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration embedded at build time, used when no file is given.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/wifiqr.toml");

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub qr: QrGenerator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    pub key: String,
}

// ============= TOML layout =============

#[derive(Deserialize)]
struct AppConfigFile {
    #[serde(default)]
    server: ServerToml,
    #[serde(default)]
    storage: StorageToml,
    #[serde(default)]
    qr: QrToml,
}

#[derive(Deserialize)]
#[serde(default)]
struct ServerToml {
    bind_addr: String,
}

impl Default for ServerToml {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct StorageToml {
    backend: String,
    path: String,
    key: String,
}

impl Default for StorageToml {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            path: "wifiqr-data.json".to_string(),
            key: DEFAULT_KEY.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct QrToml {
    size: u32,
    auth: String,
}

impl Default for QrToml {
    fn default() -> Self {
        Self {
            size: DEFAULT_QR_SIZE,
            auth: AuthType::Wpa.as_str().to_string(),
        }
    }
}

impl TryFrom<AppConfigFile> for AppConfig {
    type Error = Error;

    fn try_from(t: AppConfigFile) -> Result<Self> {
        let bind_addr = SocketAddr::from_str(&t.server.bind_addr).map_err(|e| {
            Error::InvalidConfig(format!("bind_addr '{}': {}", t.server.bind_addr, e))
        })?;

        let backend = match t.storage.backend.as_str() {
            "file" => StorageBackend::File,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(Error::InvalidConfig(format!(
                    "unknown storage backend '{}'",
                    other
                )));
            }
        };
        if t.storage.key.is_empty() {
            return Err(Error::InvalidConfig("storage key must not be empty".into()));
        }

        if t.qr.size == 0 || t.qr.size > MAX_QR_SIZE {
            return Err(Error::InvalidConfig(format!(
                "qr size must be between 1 and {}, got {}",
                MAX_QR_SIZE, t.qr.size
            )));
        }
        let auth = AuthType::from_str(&t.qr.auth)?;

        Ok(AppConfig {
            bind_addr,
            storage: StorageConfig {
                backend,
                path: PathBuf::from(t.storage.path),
                key: t.storage.key,
            },
            qr: QrGenerator {
                size: t.qr.size,
                auth,
            },
        })
    }
}

impl AppConfig {
    /// Parses configuration from a TOML string. Missing tables and fields take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let parsed: AppConfigFile = toml::from_str(s)?;
        AppConfig::try_from(parsed)
    }

    /// Reads and parses a TOML configuration file.
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }

    /// The configuration embedded in the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_parses() {
        let config = AppConfig::embedded().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.key, "saved_networks");
        assert_eq!(config.qr, QrGenerator::default());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.storage.path, PathBuf::from("wifiqr-data.json"));
        assert_eq!(config.qr.size, 512);
    }

    #[test]
    fn test_partial_override() {
        let config = AppConfig::from_toml_str(
            r#"
            [storage]
            backend = "memory"

            [qr]
            size = 256
            auth = "WEP"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.key, "saved_networks");
        assert_eq!(config.qr.size, 256);
        assert_eq!(config.qr.auth, AuthType::Wep);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for toml in [
            "[server]\nbind_addr = \"nowhere\"",
            "[storage]\nbackend = \"redis\"",
            "[storage]\nkey = \"\"",
            "[qr]\nsize = 0",
            "[qr]\nsize = 4097",
            "[qr]\nsize = 100000",
            "[qr]\nauth = \"WPA2-Enterprise\"",
        ] {
            assert!(
                matches!(AppConfig::from_toml_str(toml), Err(Error::InvalidConfig(_))),
                "{toml}"
            );
        }
        assert_eq!(
            AppConfig::from_toml_str("[qr]\nsize = 4096").unwrap().qr.size,
            MAX_QR_SIZE
        );
        assert!(matches!(
            AppConfig::from_toml_str("[qr]\nsize = \"big\""),
            Err(Error::Config(_))
        ));
    }
}
