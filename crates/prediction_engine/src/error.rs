use dotabuff_scraper::{FetchError, ParseError, ScrapeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data has not been loaded yet, try again in a minute")]
    NotReady,

    #[error("hero {name} not found")]
    NotFound { name: String },

    #[error("expected {expected} heroes, got {found}")]
    InvalidRoster { expected: usize, found: usize },

    /// Every loaded hero should have counter data against every other one;
    /// a gap means the dataset came from a partial refresh.
    #[error("no counter data for {hero} vs {opponent}")]
    InternalConsistency { hero: String, opponent: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<ScrapeError> for EngineError {
    fn from(e: ScrapeError) -> Self {
        match e {
            ScrapeError::Fetch(e) => EngineError::Fetch(e),
            ScrapeError::Parse(e) => EngineError::Parse(e),
        }
    }
}
