use std::str::FromStr;
use swarm_embeddings::{EmbeddingConfig, DEFAULT_MODEL, DEFAULT_RATE_LIMIT_RPM};
use swarm_indexer::{DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
use swarm_search_index::{
    SearchIndexConfig, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIM, DEFAULT_URL,
};

/// Process configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub typesense_url: String,
    pub typesense_api_key: String,
    pub collection: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub rate_limit_rpm: u32,
    pub embedding_dim: usize,
    pub workers: usize,
    pub batch_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            typesense_url: get("TYPESENSE_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            typesense_api_key: get("TYPESENSE_API_KEY").unwrap_or_default(),
            collection: get("TYPESENSE_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            rate_limit_rpm: parse_or(&get, "GEMINI_RATE_LIMIT", DEFAULT_RATE_LIMIT_RPM),
            embedding_dim: parse_or(&get, "SWARM_EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM),
            workers: parse_or(&get, "SWARM_WORKERS", DEFAULT_WORKERS).max(1),
            batch_size: parse_or(&get, "SWARM_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
        }
    }

    pub fn search_index(&self) -> SearchIndexConfig {
        SearchIndexConfig::new(&self.typesense_url, &self.typesense_api_key)
            .with_collection(&self.collection)
            .with_embedding_dim(self.embedding_dim)
            .with_batch_size(self.batch_size)
    }

    pub fn embeddings(&self) -> anyhow::Result<EmbeddingConfig> {
        let api_key = self
            .gemini_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
        Ok(EmbeddingConfig::new(api_key)
            .with_model(&self.gemini_model)
            .with_rate_limit(self.rate_limit_rpm)
            .with_dimensions(self.embedding_dim))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid {key}={raw:?}, using {default}");
                default
            }
        },
    }
}
