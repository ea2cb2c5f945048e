// =============================================================================
// MOEX Radar — Main Entry Point
// =============================================================================
//
// Polls MOEX ISS for the configured universe, classifies each symbol's stage,
// and pushes tiered alerts plus daily/weekly reports to Telegram.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alert;
mod app_state;
mod error;
mod indicators;
mod market_data;
mod moex;
mod notifier;
mod radar;
mod reports;
mod runtime_config;
mod signals;
mod stats;
mod trend;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::moex::MoexClient;
use crate::notifier::TelegramNotifier;
use crate::radar::Radar;
use crate::runtime_config::{parse_symbol_list, RadarConfig};

const DEFAULT_CONFIG_PATH: &str = "radar_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        MOEX Radar — Starting Up                          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    // ── 2. Config ────────────────────────────────────────────────────────
    let config_path =
        std::env::var("RADAR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RadarConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "Failed to load config, using defaults");
        RadarConfig::default()
    });

    if let Ok(raw) = std::env::var("RADAR_SYMBOLS") {
        config.symbols = parse_symbol_list(&raw);
    }
    if let Ok(raw) = std::env::var("RADAR_PRIORITY_SYMBOLS") {
        config.priority_symbols = parse_symbol_list(&raw);
    }
    if let Ok(path) = std::env::var("RADAR_STATE_PATH") {
        config.state_path = path;
    }
    config.validate().context("invalid radar configuration")?;

    info!(
        universe = ?config.universe(),
        index = %config.index_symbol,
        poll_secs = config.poll_interval_secs,
        timezone = %config.timezone,
        "Configured radar"
    );

    // ── 3. Collaborators ─────────────────────────────────────────────────
    let token = std::env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
    let chat_id = std::env::var("CHAT_ID").context("CHAT_ID is not set")?;
    let notifier = Arc::new(TelegramNotifier::new(token, chat_id, config.request_timeout_secs));

    let provider = Arc::new(MoexClient::new(
        config.index_symbol.clone(),
        config.tz()?,
        config.request_timeout_secs,
    ));

    // ── 4. Run ───────────────────────────────────────────────────────────
    let radar = Radar::new(config, provider, notifier)?;
    info!("Radar running. Press Ctrl+C to stop.");
    radar.run_forever().await?;

    info!("MOEX Radar shut down complete.");
    Ok(())
}
