use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url}: still rate limited after {attempts} attempts")]
    Throttled { url: String, attempts: u32 },

    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url}: request failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: failed to read body: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected {expected} cells, found {found}")]
    CellCount { expected: usize, found: usize },

    #[error("missing element: {0}")]
    MissingElement(&'static str),

    #[error("missing attribute `{attribute}` on {element}")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("not a match url: {0}")]
    InvalidMatchUrl(String),

    #[error("bad selector {0}")]
    Selector(String),
}

/// Fetch + parse of one page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
