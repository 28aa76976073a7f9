//! Dotabuff scraper for hero counter statistics
//!
//! Pages have no stable API, so every extractor navigates the document by
//! fixed structural position:
//!   /heroes                                   → hero roster
//!   /heroes/<slug>/counters                   → counter rows for one hero
//!   /heroes/meta?view=played&metric=faction   → radiant/dire win-rate table
//!   /matches/<id>                             → match rosters + result

pub mod error;
pub mod fetch;
pub mod model;
pub mod names;
pub mod parse;

pub use error::{FetchError, ParseError, ScrapeError};
pub use fetch::{FetcherConfig, PageFetcher};
pub use model::{Counter, Hero, MatchRecord, Side, SideWinrate, Team};
pub use names::{canonical_name, hero_from_link, BASE_URL, HERO_PATH_PREFIX};
