use dotabuff_scraper::{Hero, MatchRecord, PageFetcher};
use logger::{now_iso, EventLogger, PredictionEvent, RefreshCompletedEvent, RefreshFailedEvent};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::dataset::{Dataset, HeatmapMatrix, Prediction};
use crate::error::EngineError;
use crate::loader::{DatasetLoader, LoadReport};
use crate::sink::{PredictionRecord, PredictionSink};
use crate::ROSTER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineStatus {
    Empty = 0,
    Loading = 1,
    Ready = 2,
}

impl EngineStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineStatus::Loading,
            2 => EngineStatus::Ready,
            _ => EngineStatus::Empty,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Empty => "empty",
            EngineStatus::Loading => "loading",
            EngineStatus::Ready => "ready",
        }
    }
}

/// Shared, cheaply cloneable handle is `Arc<PredictionEngine>`.
///
/// Readers take the current `Arc<Dataset>` and never wait on a refresh; a
/// refresh builds a complete new dataset and swaps it in at the end.
pub struct PredictionEngine {
    status: AtomicU8,
    snapshot: RwLock<Option<Arc<Dataset>>>,
    refresh_lock: Mutex<()>,
    sink: Option<Arc<dyn PredictionSink>>,
    audit: Option<Arc<EventLogger>>,
    algorithm_version: String,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(EngineStatus::Empty as u8),
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            sink: None,
            audit: None,
            algorithm_version: "v1.1".to_string(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PredictionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<EventLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_algorithm_version(mut self, version: impl Into<String>) -> Self {
        self.algorithm_version = version.into();
        self
    }

    pub fn algorithm_version(&self) -> &str {
        &self.algorithm_version
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// True once any load has completed, including while a later refresh runs.
    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<Dataset>> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn snapshot(&self) -> Result<Arc<Dataset>, EngineError> {
        self.current().ok_or(EngineError::NotReady)
    }

    /// Replaces the served dataset and marks the engine ready.
    pub fn install(&self, dataset: Dataset) {
        let dataset = Arc::new(dataset);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Some(dataset),
            Err(poisoned) => *poisoned.into_inner() = Some(dataset),
        }
        self.status.store(EngineStatus::Ready as u8, Ordering::Release);
    }

    /// One refresh cycle. Concurrent callers queue behind each other.
    /// On failure the previous dataset (if any) keeps being served.
    pub async fn refresh(&self, loader: &DatasetLoader) -> anyhow::Result<LoadReport> {
        let _guard = self.refresh_lock.lock().await;
        self.status.store(EngineStatus::Loading as u8, Ordering::Release);
        info!("refresh started");

        match loader.load().await {
            Ok((dataset, report)) => {
                self.install(dataset);
                info!(
                    heroes = report.heroes,
                    counter_sources = report.counter_sources,
                    failed = report.failed_heroes.len(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "refresh completed"
                );
                self.audit(&RefreshCompletedEvent {
                    ts: now_iso(),
                    event: "REFRESH_COMPLETED",
                    heroes: report.heroes,
                    counter_sources: report.counter_sources,
                    failed_heroes: report.failed_heroes.clone(),
                    side_winrates: report.side_winrates,
                    elapsed_ms: report.elapsed.as_millis() as u64,
                });
                Ok(report)
            }
            Err(e) => {
                let restored = if self.is_ready() { EngineStatus::Ready } else { EngineStatus::Empty };
                self.status.store(restored as u8, Ordering::Release);
                error!("refresh failed: {:#}", e);
                self.audit(&RefreshFailedEvent {
                    ts: now_iso(),
                    event: "REFRESH_FAILED",
                    message: format!("{e:#}"),
                });
                Err(e)
            }
        }
    }

    fn audit<T: serde::Serialize>(&self, event: &T) {
        if let Some(audit) = &self.audit {
            audit.log_quiet(event);
        }
    }

    /// First five names are radiant, last five dire.
    pub fn resolve_heroes<S: AsRef<str>>(&self, names: &[S]) -> Result<(Vec<Hero>, Vec<Hero>), EngineError> {
        resolve_in(&*self.snapshot()?, names)
    }

    pub fn predict_win_rate(&self, radiant: &[Hero], dire: &[Hero]) -> Result<Prediction, EngineError> {
        predict_in(&*self.snapshot()?, radiant, dire)
    }

    pub fn predict_from_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Prediction, EngineError> {
        let dataset = self.snapshot()?;
        let (radiant, dire) = resolve_in(&dataset, names)?;
        let prediction = predict_in(&dataset, &radiant, &dire)?;
        debug!(radiant = prediction.radiant, dire = prediction.dire, "prediction from names");
        self.audit_prediction("names", &radiant, &dire, prediction, None);
        Ok(prediction)
    }

    /// Scrapes a finished match, predicts its draft and hands the result to
    /// the sink without waiting for it.
    pub async fn predict_from_match_url(
        &self,
        fetcher: &PageFetcher,
        url: &str,
    ) -> Result<(MatchRecord, Prediction), EngineError> {
        let dataset = self.snapshot()?;
        let record = fetcher.fetch_match(url).await?;

        let radiant = resolve_exact(&dataset, &record.radiant)?;
        let dire = resolve_exact(&dataset, &record.dire)?;
        let prediction = predict_in(&dataset, &radiant, &dire)?;

        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            let row = PredictionRecord::new(&record, prediction, &self.algorithm_version);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = sink.record(row) {
                    warn!("prediction sink: {:#}", e);
                }
            });
        }

        self.audit_prediction("match_url", &radiant, &dire, prediction, Some(record.match_id));
        Ok((record, prediction))
    }

    pub fn heatmap_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<HeatmapMatrix, EngineError> {
        let dataset = self.snapshot()?;
        let (radiant, dire) = resolve_in(&dataset, names)?;
        dataset.heatmap(&radiant, &dire)
    }

    fn audit_prediction(
        &self,
        source: &'static str,
        radiant: &[Hero],
        dire: &[Hero],
        prediction: Prediction,
        match_id: Option<i64>,
    ) {
        self.audit(&PredictionEvent {
            ts: now_iso(),
            event: "PREDICTION",
            source,
            radiant: radiant.iter().map(|h| h.name.clone()).collect(),
            dire: dire.iter().map(|h| h.name.clone()).collect(),
            radiant_score: prediction.radiant,
            dire_score: prediction.dire,
            match_id,
        });
    }
}

fn resolve_in<S: AsRef<str>>(dataset: &Dataset, names: &[S]) -> Result<(Vec<Hero>, Vec<Hero>), EngineError> {
    if names.len() != 2 * ROSTER_SIZE {
        return Err(EngineError::InvalidRoster {
            expected: 2 * ROSTER_SIZE,
            found: names.len(),
        });
    }

    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref().trim();
        let hero = dataset
            .resolve(name)
            .ok_or_else(|| EngineError::NotFound { name: name.to_string() })?;
        resolved.push(hero.clone());
    }

    let dire = resolved.split_off(ROSTER_SIZE);
    Ok((resolved, dire))
}

fn predict_in(dataset: &Dataset, radiant: &[Hero], dire: &[Hero]) -> Result<Prediction, EngineError> {
    for side in [radiant, dire] {
        if side.len() != ROSTER_SIZE {
            return Err(EngineError::InvalidRoster {
                expected: ROSTER_SIZE,
                found: side.len(),
            });
        }
    }
    dataset.predict(radiant, dire)
}

/// Match pages carry canonical names, so aliases are not consulted.
fn resolve_exact(dataset: &Dataset, heroes: &[Hero]) -> Result<Vec<Hero>, EngineError> {
    heroes
        .iter()
        .map(|h| {
            dataset
                .resolve(&h.name)
                .filter(|found| found.name == h.name)
                .cloned()
                .ok_or_else(|| EngineError::NotFound { name: h.name.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotabuff_scraper::{hero_from_link, Counter};

    const SLUGS: [&str; 10] = [
        "axe", "lion", "tiny", "muerta", "tusk", "snapfire", "hoodwink", "gyrocopter", "underlord", "ursa",
    ];

    fn flat_dataset(slugs: &[&str], win_rate: f64) -> Dataset {
        let heroes: Vec<Hero> = slugs.iter().map(|s| hero_from_link(&format!("/heroes/{s}"))).collect();
        let pages: Vec<(String, Vec<Counter>)> = heroes
            .iter()
            .map(|page| {
                let rows = heroes
                    .iter()
                    .filter(|h| h.name != page.name)
                    .map(|h| Counter {
                        hero: h.clone(),
                        disadvantage: 0.0,
                        win_rate,
                        matches_played: 10,
                    })
                    .collect();
                (page.name.clone(), rows)
            })
            .collect();
        Dataset::build(heroes, pages, Vec::new())
    }

    fn names() -> Vec<String> {
        SLUGS.iter().map(|s| hero_from_link(&format!("/heroes/{s}")).name).collect()
    }

    #[test]
    fn snapshot_taken_before_swap_stays_self_consistent() {
        let engine = PredictionEngine::new();
        engine.install(flat_dataset(&SLUGS, 52.0));
        let old = engine.snapshot().unwrap();
        let (radiant, dire) = resolve_in(&old, &names()).unwrap();

        // new roster drops Ursa entirely
        engine.install(flat_dataset(&SLUGS[..9], 48.0));

        let p = predict_in(&old, &radiant, &dire).unwrap();
        assert_eq!((p.radiant, p.dire), (52.0, 52.0));
        assert!(old.heatmap(&radiant, &dire).is_ok());

        match engine.predict_from_names(&names()) {
            Err(EngineError::NotFound { name }) => assert_eq!(name, "Ursa"),
            other => panic!("unexpected: {other:?}"),
        }
        match engine.heatmap_matrix(&names()) {
            Err(EngineError::NotFound { name }) => assert_eq!(name, "Ursa"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fresh_engine_is_not_ready() {
        let engine = PredictionEngine::new();
        assert_eq!(engine.status(), EngineStatus::Empty);
        assert!(!engine.is_ready());
        assert!(matches!(engine.snapshot(), Err(EngineError::NotReady)));
        assert!(matches!(
            engine.predict_from_names(&["a"; 10]),
            Err(EngineError::NotReady)
        ));
    }

    #[test]
    fn install_marks_ready() {
        let engine = PredictionEngine::new();
        engine.install(Dataset::build(Vec::new(), Vec::new(), Vec::new()));
        assert_eq!(engine.status(), EngineStatus::Ready);
        assert!(engine.is_ready());
    }

    #[test]
    fn wrong_name_count_is_invalid_roster() {
        let engine = PredictionEngine::new();
        engine.install(Dataset::build(Vec::new(), Vec::new(), Vec::new()));
        assert!(matches!(
            engine.predict_from_names(&["Axe"; 9]),
            Err(EngineError::InvalidRoster { expected: 10, found: 9 })
        ));
    }
}
