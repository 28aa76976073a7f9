use anyhow::{Context, Result};
use dotabuff_scraper::FetcherConfig;
use prediction_engine::LoaderConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read once at startup after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_dir: PathBuf,
    pub refresh_interval: Duration,
    pub loader: LoaderConfig,
    pub fetcher: FetcherConfig,
    pub http_bind: SocketAddr,
    pub telegram_token: Option<String>,
    /// `None` disables the SQLite sink.
    pub db_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub heatmap_script: PathBuf,
    pub python_bin: String,
    pub algorithm_version: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` returns the raw value of a variable, if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str| -> Result<Option<Duration>> {
            Ok(parse_opt::<u64>(key, get(key))?.map(Duration::from_secs))
        };

        let defaults = FetcherConfig::default();
        let fetcher = FetcherConfig {
            max_retries: parse_opt("OWL_FETCH_MAX_RETRIES", get("OWL_FETCH_MAX_RETRIES"))?
                .unwrap_or(defaults.max_retries),
            backoff_base: secs("OWL_FETCH_BACKOFF_SECS")?.unwrap_or(defaults.backoff_base),
            min_interval: parse_opt::<u64>("OWL_FETCH_MIN_INTERVAL_MS", get("OWL_FETCH_MIN_INTERVAL_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_interval),
            ..defaults
        };

        let loader = LoaderConfig {
            heroes_ttl: secs("OWL_HEROES_TTL_SECS")?,
            counters_ttl: Some(secs("OWL_COUNTERS_TTL_SECS")?.unwrap_or(Duration::from_secs(86_400))),
            side_winrates_ttl: secs("OWL_SIDE_WINRATES_TTL_SECS")?,
        };

        // Set-but-empty turns the sink off, unset falls back to the default file.
        let db_path = match lookup("OWL_DB_PATH") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v.trim())),
            None => Some(PathBuf::from("data/predictions.db")),
        };

        Ok(Self {
            cache_dir: get("OWL_CACHE_DIR").unwrap_or_else(|| "data/cache".into()).into(),
            refresh_interval: secs("OWL_REFRESH_INTERVAL_SECS")?.unwrap_or(Duration::from_secs(1800)),
            loader,
            fetcher,
            http_bind: parse_opt("OWL_HTTP_BIND", get("OWL_HTTP_BIND"))?
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080))),
            telegram_token: get("TELEGRAM_BOT_TOKEN"),
            db_path,
            log_dir: get("OWL_LOG_DIR").unwrap_or_else(|| "logs".into()).into(),
            heatmap_script: get("OWL_HEATMAP_SCRIPT").unwrap_or_else(|| "heatmap.py".into()).into(),
            python_bin: get("OWL_PYTHON_BIN").unwrap_or_else(|| "python3".into()),
            algorithm_version: get("OWL_ALGORITHM_VERSION").unwrap_or_else(|| "v1.1".into()),
        })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir.join(".owl-esports.lock")
    }
}

fn parse_opt<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map(|v| v.parse::<T>().with_context(|| format!("invalid {key}={v:?}")))
        .transpose()
}
