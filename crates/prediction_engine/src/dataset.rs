use chrono::{DateTime, Utc};
use dotabuff_scraper::{Counter, Hero, Side, SideWinrate};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::index::HeroIndex;

/// Independent per-side scores: each is an average of pairwise counter
/// win rates, so the two need not sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub radiant: f64,
    pub dire: f64,
}

impl Prediction {
    pub fn radiant_favoured(&self) -> bool {
        self.radiant > self.dire
    }
}

/// Pairwise win rates for the heat-map renderer.
/// `rows[i][j]` is dire hero j's win rate against radiant hero i.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapMatrix {
    pub heroes: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl HeatmapMatrix {
    pub fn heroes_arg(&self) -> String {
        self.heroes.join(",")
    }

    pub fn winrates_arg(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.iter().map(|v| format!("{v:.2}")).collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// One complete load of the source data. Never mutated after `build`;
/// a refresh produces a new `Dataset`.
#[derive(Debug, Clone)]
pub struct Dataset {
    heroes: Vec<Hero>,
    index: HeroIndex,
    /// counter hero → opponent → how the counter hero does against the opponent
    /// (taken from the opponent's counters page)
    counters: HashMap<String, HashMap<String, Counter>>,
    counter_sources: usize,
    side_winrates: HashMap<String, SideWinrate>,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    /// `counter_pages` pairs each hero with the rows of its own counters page.
    pub fn build(
        mut heroes: Vec<Hero>,
        counter_pages: impl IntoIterator<Item = (String, Vec<Counter>)>,
        side_winrates: Vec<SideWinrate>,
    ) -> Self {
        heroes.sort_by(|a, b| a.name.cmp(&b.name));
        let index = HeroIndex::build(&heroes);

        let mut counters: HashMap<String, HashMap<String, Counter>> = HashMap::new();
        let mut counter_sources = 0;
        for (page_hero, rows) in counter_pages {
            counter_sources += 1;
            for counter in rows {
                counters
                    .entry(counter.hero.name.clone())
                    .or_default()
                    .insert(page_hero.clone(), counter);
            }
        }

        let side_winrates = side_winrates
            .into_iter()
            .map(|wr| (wr.hero.name.clone(), wr))
            .collect();

        Self {
            heroes,
            index,
            counters,
            counter_sources,
            side_winrates,
            loaded_at: Utc::now(),
        }
    }

    pub fn heroes(&self) -> &[Hero] {
        &self.heroes
    }

    pub fn index(&self) -> &HeroIndex {
        &self.index
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn counter_sources(&self) -> usize {
        self.counter_sources
    }

    pub fn resolve(&self, name: &str) -> Option<&Hero> {
        self.index.resolve(name)
    }

    /// How `hero` performs against `opponent`.
    pub fn counter(&self, hero: &str, opponent: &str) -> Option<&Counter> {
        self.counters.get(hero).and_then(|m| m.get(opponent))
    }

    pub fn side_winrate(&self, hero: &str) -> Option<&SideWinrate> {
        self.side_winrates.get(hero)
    }

    /// Hook for a faction-conditioned adjustment; neutral for now.
    pub fn side_multiplier(&self, _hero: &Hero, _side: Side) -> f64 {
        1.0
    }

    fn counter_or_err(&self, hero: &str, opponent: &str) -> Result<&Counter, EngineError> {
        self.counter(hero, opponent)
            .ok_or_else(|| EngineError::InternalConsistency {
                hero: hero.to_string(),
                opponent: opponent.to_string(),
            })
    }

    /// Mean over `team` of each hero's mean win rate against `opponents`,
    /// scaled by the side multiplier. Both slices must be non-empty.
    pub fn score_side(&self, side: Side, team: &[Hero], opponents: &[Hero]) -> Result<f64, EngineError> {
        let mut total = 0.0;
        for hero in team {
            let mut vs_pick = 0.0;
            for enemy in opponents {
                vs_pick += self.counter_or_err(&hero.name, &enemy.name)?.win_rate;
            }
            total += vs_pick / opponents.len() as f64 * self.side_multiplier(hero, side);
        }
        Ok(total / team.len() as f64)
    }

    pub fn predict(&self, radiant: &[Hero], dire: &[Hero]) -> Result<Prediction, EngineError> {
        Ok(Prediction {
            radiant: self.score_side(Side::Radiant, radiant, dire)?,
            dire: self.score_side(Side::Dire, dire, radiant)?,
        })
    }

    pub fn heatmap(&self, radiant: &[Hero], dire: &[Hero]) -> Result<HeatmapMatrix, EngineError> {
        let mut rows = Vec::with_capacity(radiant.len());
        for r in radiant {
            let mut row = Vec::with_capacity(dire.len());
            for d in dire {
                row.push(self.counter_or_err(&d.name, &r.name)?.win_rate);
            }
            rows.push(row);
        }

        Ok(HeatmapMatrix {
            heroes: radiant.iter().chain(dire).map(|h| h.name.clone()).collect(),
            rows,
        })
    }
}
