//! Owl Esports service glue: configuration, HTTP API, Telegram bot,
//! heat-map rendering and the SQLite prediction store.

pub mod config;
pub mod heatmap;
pub mod http_api;
pub mod match_db;
pub mod telegram;

use dotabuff_scraper::PageFetcher;
use prediction_engine::DatasetLoader;
use stats_cache::FreshnessCache;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

pub fn init_tracing() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();
}

pub fn dataset_loader(cfg: &AppConfig) -> DatasetLoader {
    let fetcher = Arc::new(PageFetcher::new(cfg.fetcher.clone()));
    DatasetLoader::new(fetcher, FreshnessCache::new(&cfg.cache_dir), cfg.loader.clone())
}
