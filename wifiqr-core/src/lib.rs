//! Core library for the WiFi QR generator.
//! This crate defines the shared data types and traits, the credential
//! formatter, the QR renderer, the saved-network store with its key-value
//! backends, the application state reducer, and the web server that exposes
//! it all to the browser UI.

pub mod config;
pub mod factory;
pub mod formatter;
pub mod frontends;
pub mod renderer;
pub mod state;
pub mod store;
pub mod traits;
pub mod web_server;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("QR encode error: {0}")]
    QrEncode(#[from] qrcode::types::QrError),

    #[error("QR code needs {needed}px but only {size}px were requested")]
    QrDoesNotFit { needed: u32, size: u32 },

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Web server error: {0}")]
    WebServer(#[from] axum::BoxError),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Persistence worker is not running")]
    PersistWorkerStopped,

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
