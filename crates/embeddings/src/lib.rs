//! # Swarm Embeddings
//!
//! Rate-limited, retrying client for a remote text embedding API (Gemini).
//!
//! ## Request path
//!
//! ```text
//! embed / embed_batch
//!     │
//!     ├──> Input validation (empty text => InvalidInput)
//!     │
//!     ├──> Token bucket (rpm / 60 tokens per second, burst 1)
//!     │
//!     ├──> POST embedContent | batchEmbedContents
//!     │      └─> 429/5xx or transport failure => backoff 1s, 2s, 4s
//!     │
//!     └──> Vec<f32> per input, input order preserved
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use swarm_embeddings::{EmbeddingClient, EmbeddingConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EmbeddingClient::new(EmbeddingConfig::new("api-key").with_rate_limit(120))?;
//!     let cancel = CancellationToken::new();
//!     let vectors = client
//!         .embed_batch(&cancel, &["fn main() {}".to_string()])
//!         .await?;
//!     println!("{} dims", vectors[0].len());
//!     Ok(())
//! }
//! ```

mod client;
mod embedder;
mod error;
mod rate_limit;
mod retry;
mod wire;

pub use client::{
    EmbeddingClient, EmbeddingConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_RATE_LIMIT_RPM,
    DEFAULT_TIMEOUT,
};
pub use embedder::Embedder;
pub use error::{EmbeddingError, Result};
pub use rate_limit::TokenBucket;
pub use retry::{RetryPolicy, RETRYABLE_STATUSES};
