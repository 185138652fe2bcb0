//! Info-board feeder binary entrypoint.
//!
//! One run refreshes every stale source document through the freshness
//! gate, then performs the telemetry collection pass and exits.

use std::path::{Path, PathBuf};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use infoboard_feeder::config::{import, Settings};
use infoboard_feeder::fetch::HttpFetcher;
use infoboard_feeder::{sources, telemetry};

const ENV_DATA_DIR: &str = "INFOBOARD_DATA_DIR";
const ENV_CONFIG_HEADER: &str = "INFOBOARD_CONFIG_HEADER";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let data_dir = std::env::var(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    std::fs::create_dir_all(&data_dir)?;
    let config_path = data_dir.join("config.json");

    // Optional one-shot import of firmware header constants, so the
    // feeder and the display share one config document.
    if let Ok(header) = std::env::var(ENV_CONFIG_HEADER) {
        if let Err(e) = import::sync_from_header(Path::new(&header), &config_path) {
            tracing::warn!(error = ?e, header = %header, "config header import failed");
        }
    }

    let settings = Settings::load(&config_path);
    let fetcher = HttpFetcher::new();

    sources::run_all(&fetcher, &data_dir, &settings).await;

    if let Err(e) = telemetry::run_continuous(&settings.aprs, &data_dir).await {
        tracing::error!(error = ?e, "telemetry pass failed");
    }

    tracing::info!("all source documents processed");
    Ok(())
}
