//! Owl Esports: Dota 2 draft predictor
//!
//!   1. Loads hero counters from Dotabuff (through the on-disk cache)
//!   2. Refreshes the dataset every OWL_REFRESH_INTERVAL_SECS
//!   3. Serves predictions over HTTP and, with TELEGRAM_BOT_TOKEN set, a chat bot
//!   4. Stores match-link predictions in SQLite for later scoring
//!
//! Run:
//!   cargo run --bin owl-esports

use anyhow::{Context, Result};
use dotenv::dotenv;
use logger::EventLogger;
use owl_esports::config::AppConfig;
use owl_esports::heatmap::HeatmapRenderer;
use owl_esports::http_api::{self, ApiState, PicklineRequest};
use owl_esports::match_db::MatchDb;
use owl_esports::telegram::TelegramBot;
use prediction_engine::PredictionEngine;
use std::fs::File;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    owl_esports::init_tracing();

    let cfg = AppConfig::from_env().context("configuration")?;
    info!("=== Owl Esports (algorithm {}) ===", cfg.algorithm_version);
    info!("Cache: {}  Logs: {}", cfg.cache_dir.display(), cfg.log_dir.display());

    std::fs::create_dir_all(&cfg.cache_dir)
        .with_context(|| format!("create {}", cfg.cache_dir.display()))?;

    // Single instance lock
    let lock_file_path = cfg.lock_path();
    let lock_file = File::create(&lock_file_path)
        .with_context(|| format!("create lock file {}", lock_file_path.display()))?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another owl-esports instance owns {}. Exiting.", cfg.cache_dir.display());
            return Ok(());
        }
    };

    let audit = Arc::new(EventLogger::new(&cfg.log_dir));
    let mut engine = PredictionEngine::new()
        .with_audit_log(audit)
        .with_algorithm_version(cfg.algorithm_version.clone());
    match &cfg.db_path {
        Some(path) => {
            info!("Prediction store: {}", path.display());
            engine = engine.with_sink(Arc::new(MatchDb::spawn(path)));
        }
        None => info!("Prediction store disabled"),
    }
    let engine = Arc::new(engine);

    let loader = owl_esports::dataset_loader(&cfg);
    let fetcher = Arc::clone(loader.fetcher());

    // First tick fires immediately, so startup kicks off the initial load.
    let refresh_engine = Arc::clone(&engine);
    let refresh_interval = cfg.refresh_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // failures are logged and audited inside refresh
            let _ = refresh_engine.refresh(&loader).await;
        }
    });

    let pickline = if let Some(token) = cfg.telegram_token.clone() {
        let renderer = match HeatmapRenderer::new(
            cfg.python_bin.clone(),
            &cfg.heatmap_script,
            cfg.cache_dir.join("heatmaps"),
        ) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("heat maps disabled: {e:#}");
                None
            }
        };
        let bot = Arc::new(TelegramBot::new(token, Arc::clone(&engine), Arc::clone(&fetcher), renderer));
        let (tx, rx) = mpsc::channel::<PicklineRequest>(64);
        let poller = Arc::clone(&bot);
        tokio::spawn(async move { poller.run().await });
        tokio::spawn(async move { bot.serve_pickline(rx).await });
        Some(tx)
    } else {
        info!("TELEGRAM_BOT_TOKEN not set, chat bot disabled");
        None
    };

    let state = ApiState { engine, fetcher, pickline };
    tokio::select! {
        res = http_api::serve(state, cfg.http_bind) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    }
}
