use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchIndexError>;

#[derive(Error, Debug)]
pub enum SearchIndexError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Search backend error (status={status}): {message}")]
    Api { status: u16, message: String },

    #[error("{failed} of {total} documents rejected: {first_error}")]
    Rejected {
        failed: usize,
        total: usize,
        first_error: String,
    },

    #[error("Batch group {group} failed after {written} records were written: {source}")]
    BatchFailed {
        group: usize,
        written: usize,
        #[source]
        source: Box<SearchIndexError>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Search index request cancelled")]
    Cancelled,
}

impl SearchIndexError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::BatchFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
