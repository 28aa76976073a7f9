use serde::{Deserialize, Serialize};

/// Field names are PascalCase so cache files stay readable by older tooling
/// that wrote the same blobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Hero {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Team {
    pub name: String,
    pub link: String,
}

/// One row of a hero's counters page.
///
/// Directional: a `Counter` scraped from hero H's page describes
/// `counter.hero` playing against H.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Counter {
    pub hero: Hero,
    pub disadvantage: f64,
    pub win_rate: f64,
    pub matches_played: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SideWinrate {
    pub hero: Hero,
    pub radiant_winrate: f64,
    pub radiant_pick_rate: f64,
    pub dire_winrate: f64,
    pub dire_pick_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchRecord {
    #[serde(rename = "MatchID")]
    pub match_id: i64,
    pub radiant: Vec<Hero>,
    pub dire: Vec<Hero>,
    pub radiant_team: Team,
    pub dire_team: Team,
    pub radiant_won: bool,
    pub tournament_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Radiant,
    Dire,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Radiant => "radiant",
            Side::Dire => "dire",
        }
    }
}
