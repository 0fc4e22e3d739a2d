use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] swarm_embeddings::EmbeddingError),

    #[error("Search index error: {0}")]
    SearchIndexError(#[from] swarm_search_index::SearchIndexError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid root: {0}")]
    InvalidRoot(String),

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::EmbeddingError(err) => err.is_cancelled(),
            Self::SearchIndexError(err) => err.is_cancelled(),
            _ => false,
        }
    }
}
