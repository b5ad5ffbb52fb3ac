mod runner;

use anyhow::Context;
use wifiqr_core::{config::AppConfig, factory::create_frontend};

/// Env var naming a TOML file that replaces the embedded configuration.
const CONFIG_ENV: &str = "WIFIQR_CONFIG";

async fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            tracing::info!("📄 Loading configuration from {}", path.to_string_lossy());
            AppConfig::from_file(&path)
                .await
                .with_context(|| format!("failed to load {}", path.to_string_lossy()))
        }
        None => {
            tracing::info!("📄 Using embedded configuration");
            AppConfig::embedded().context("embedded configuration is invalid")
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Logging is the entry point's job.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 2. Configuration, frontend, then the server itself.
    let result = async {
        let config = load_config().await?;
        let frontend = create_frontend();
        runner::run(config, frontend).await
    }
    .await;

    // 3. Top-level error handling.
    if let Err(e) = result {
        tracing::error!("❌ WiFi QR daemon failed: {:#}", e);
        std::process::exit(1);
    }
}
