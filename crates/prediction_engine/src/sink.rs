use dotabuff_scraper::{Hero, MatchRecord};

use crate::dataset::Prediction;

/// One resolved match with the prediction made for it, as handed to the
/// persistence sink. `match_id` is the upsert key.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub match_id: i64,
    pub dire_heroes: String,
    pub radiant_heroes: String,
    pub radiant_won: bool,
    pub predicted_radiant_won: bool,
    pub tournament_link: String,
    pub dire_team_link: String,
    pub radiant_team_link: String,
    pub radiant_score: f64,
    pub dire_score: f64,
    pub algorithm_version: String,
}

impl PredictionRecord {
    pub fn new(record: &MatchRecord, prediction: Prediction, algorithm_version: &str) -> Self {
        Self {
            match_id: record.match_id,
            dire_heroes: join_names(&record.dire),
            radiant_heroes: join_names(&record.radiant),
            radiant_won: record.radiant_won,
            predicted_radiant_won: prediction.radiant_favoured(),
            tournament_link: record.tournament_link.clone().unwrap_or_default(),
            dire_team_link: record.dire_team.link.clone(),
            radiant_team_link: record.radiant_team.link.clone(),
            radiant_score: prediction.radiant,
            dire_score: prediction.dire,
            algorithm_version: algorithm_version.to_string(),
        }
    }
}

fn join_names(heroes: &[Hero]) -> String {
    heroes.iter().map(|h| h.name.as_str()).collect::<Vec<_>>().join(" ")
}

/// Where predictions for real matches are kept for later evaluation.
/// Called off the request path; a duplicate `match_id` must be ignored,
/// not reported as an error.
pub trait PredictionSink: Send + Sync {
    fn record(&self, record: PredictionRecord) -> anyhow::Result<()>;
}
