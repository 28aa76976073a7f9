use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use scraper::Html;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{FetchError, ScrapeError};
use crate::model::{Counter, Hero, MatchRecord, SideWinrate};
use crate::names::BASE_URL;
use crate::parse;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    /// Throttled (HTTP 429) attempts tolerated before giving up.
    pub max_retries: u32,
    /// Sleep after the n-th throttled attempt is `backoff_base * n`.
    pub backoff_base: Duration,
    /// Minimum spacing between outgoing requests; zero disables pacing.
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            max_retries: 6,
            backoff_base: Duration::from_secs(10),
            min_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct PageFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl PageFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let limiter = Quota::with_period(config.min_interval).map(RateLimiter::direct);

        Self { client, config, limiter }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn heroes_url(&self) -> String {
        format!("{}/heroes", self.config.base_url)
    }

    pub fn side_winrates_url(&self) -> String {
        format!("{}/heroes/meta?view=played&metric=faction", self.config.base_url)
    }

    /// Counters page of a hero. Hero links always point at the public site,
    /// so only the path is kept and rebased onto the configured origin.
    pub fn counters_url(&self, hero: &Hero) -> String {
        let path = hero.link.strip_prefix(BASE_URL).unwrap_or(&hero.link);
        format!("{}{}/counters", self.config.base_url, path)
    }

    pub fn match_url(&self, match_id: i64) -> String {
        format!("{}/matches/{}", self.config.base_url, match_id)
    }

    /// GET a page body, backing off on HTTP 429 up to `max_retries` times.
    /// Any other non-2xx status or transport failure fails immediately.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let mut retry: u32 = 0;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|source| FetchError::Transport { url: url.to_string(), source })?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if retry >= self.config.max_retries {
                    return Err(FetchError::Throttled {
                        url: url.to_string(),
                        attempts: retry + 1,
                    });
                }
                let wait = self.config.backoff_base * (retry + 1);
                warn!(url, retry, wait_secs = wait.as_secs_f64(), "rate limited, sleeping");
                sleep(wait).await;
                retry += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            debug!(url, %status, "page fetched");
            return resp
                .text()
                .await
                .map_err(|source| FetchError::Body { url: url.to_string(), source });
        }
    }

    pub async fn fetch_document(&self, url: &str) -> Result<Html, FetchError> {
        let body = self.fetch_page(url).await?;
        Ok(Html::parse_document(&body))
    }

    pub async fn fetch_heroes(&self) -> Result<Vec<Hero>, ScrapeError> {
        let doc = self.fetch_document(&self.heroes_url()).await?;
        let heroes = parse::parse_hero_roster(&doc)?;
        info!(count = heroes.len(), "hero roster fetched");
        Ok(heroes)
    }

    pub async fn fetch_counters(&self, hero: &Hero) -> Result<Vec<Counter>, ScrapeError> {
        let doc = self.fetch_document(&self.counters_url(hero)).await?;
        Ok(parse::parse_counters(&doc)?)
    }

    pub async fn fetch_side_winrates(&self) -> Result<Vec<SideWinrate>, ScrapeError> {
        let doc = self.fetch_document(&self.side_winrates_url()).await?;
        Ok(parse::parse_side_winrates(&doc)?)
    }

    /// Fetches and parses a match page. `url` must contain `/matches/<id>`.
    pub async fn fetch_match(&self, url: &str) -> Result<MatchRecord, ScrapeError> {
        let match_id = parse::match_id_from_url(url)?;
        let doc = self.fetch_document(&self.match_url(match_id)).await?;
        Ok(parse::parse_match(&doc, url)?)
    }
}
