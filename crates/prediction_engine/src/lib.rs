//! Prediction Engine: draft win-rate estimate from pairwise hero counters
//!
//! Data flow:
//!   DatasetLoader (fetch + parse + freshness cache) → Dataset (immutable)
//!   → PredictionEngine (atomic status + Arc swap) → callers (HTTP, bot, CLI)

pub mod dataset;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod sink;

pub use dataset::{Dataset, HeatmapMatrix, Prediction};
pub use engine::{EngineStatus, PredictionEngine};
pub use error::EngineError;
pub use index::{derive_aliases, HeroIndex};
pub use loader::{DatasetLoader, LoadReport, LoaderConfig};
pub use sink::{PredictionRecord, PredictionSink};

/// Heroes per side.
pub const ROSTER_SIZE: usize = 5;
