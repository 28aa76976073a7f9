use anyhow::{bail, Result};
use dotabuff_scraper::{Counter, Hero, PageFetcher, SideWinrate};
use stats_cache::FreshnessCache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::dataset::Dataset;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// `None` keeps the roster until the cache file is removed.
    pub heroes_ttl: Option<Duration>,
    pub counters_ttl: Option<Duration>,
    pub side_winrates_ttl: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            heroes_ttl: None,
            counters_ttl: Some(Duration::from_secs(24 * 3600)),
            side_winrates_ttl: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub heroes: usize,
    pub counter_sources: usize,
    pub failed_heroes: Vec<String>,
    pub side_winrates: usize,
    pub elapsed: Duration,
}

/// Runs one refresh cycle: roster, then each hero's counters one at a time,
/// then the faction table. Every key goes through the freshness cache.
pub struct DatasetLoader {
    fetcher: Arc<PageFetcher>,
    cache: FreshnessCache,
    config: LoaderConfig,
}

impl DatasetLoader {
    pub fn new(fetcher: Arc<PageFetcher>, cache: FreshnessCache, config: LoaderConfig) -> Self {
        Self { fetcher, cache, config }
    }

    pub fn fetcher(&self) -> &Arc<PageFetcher> {
        &self.fetcher
    }

    fn counters_key(hero: &Hero) -> String {
        format!("counters:{}", hero.name)
    }

    /// A missing roster or faction table fails the whole load.
    /// A single hero's counters failing only shrinks coverage.
    pub async fn load(&self) -> Result<(Dataset, LoadReport)> {
        let started = Instant::now();
        let fetcher = Arc::clone(&self.fetcher);

        let mut heroes: Vec<Hero> = self
            .cache
            .get_or_refresh("heroes", self.config.heroes_ttl, || async move {
                Ok(fetcher.fetch_heroes().await?)
            })
            .await?;
        if heroes.is_empty() {
            bail!("hero roster is empty");
        }
        heroes.sort_by(|a, b| a.name.cmp(&b.name));
        info!(count = heroes.len(), "hero roster loaded");

        let mut pages: Vec<(String, Vec<Counter>)> = Vec::with_capacity(heroes.len());
        let mut failed_heroes = Vec::new();
        for hero in &heroes {
            let fetcher = Arc::clone(&self.fetcher);
            let result = self
                .cache
                .get_or_refresh(&Self::counters_key(hero), self.config.counters_ttl, || async move {
                    Ok(fetcher.fetch_counters(hero).await?)
                })
                .await;

            match result {
                Ok(rows) => pages.push((hero.name.clone(), rows)),
                Err(e) => {
                    warn!(hero = %hero.name, "counters unavailable: {:#}", e);
                    failed_heroes.push(hero.name.clone());
                }
            }
        }

        let fetcher = Arc::clone(&self.fetcher);
        let side_winrates: Vec<SideWinrate> = self
            .cache
            .get_or_refresh("side-winrates", self.config.side_winrates_ttl, || async move {
                Ok(fetcher.fetch_side_winrates().await?)
            })
            .await?;

        let report = LoadReport {
            heroes: heroes.len(),
            counter_sources: pages.len(),
            failed_heroes,
            side_winrates: side_winrates.len(),
            elapsed: started.elapsed(),
        };

        Ok((Dataset::build(heroes, pages, side_winrates), report))
    }
}
