//! # Swarm Indexer
//!
//! Incremental indexing of source trees into a hybrid (text + vector) search index.
//!
//! ## Pipeline
//!
//! ```text
//! Root
//!     │
//!     ├──> Content hash (path, size, mtime) ── unchanged? ──> skip root
//!     │
//!     ├──> Walker (.gitignore aware, dot-directories and binaries skipped)
//!     │      └─> bounded job queue
//!     │
//!     ├──> N workers: secrets skip/redact → language → chunk → embed (one call per file)
//!     │      │         → drop the file's previous records
//!     │      └─> shared batch buffer
//!     │
//!     ├──> Search index (upsert per full batch, final partial flush)
//!     │
//!     ├──> Delete records of files gone since the last run
//!     │
//!     └──> Metadata sidecar (hash + run stats + walked paths)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swarm_embeddings::{EmbeddingClient, EmbeddingConfig};
//! use swarm_indexer::{IndexOptions, Orchestrator};
//! use swarm_search_index::{SearchIndexClient, SearchIndexConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = EmbeddingClient::new(EmbeddingConfig::new("api-key"))?;
//!     let index = SearchIndexClient::new(SearchIndexConfig::new("http://localhost:8108", "xyz"))?;
//!     let orchestrator = Orchestrator::new(Arc::new(embedder), Arc::new(index));
//!
//!     let cancel = CancellationToken::new();
//!     let reports = orchestrator
//!         .index_roots(&cancel, &["/path/to/project".into()], &IndexOptions::default())
//!         .await?;
//!     for report in reports {
//!         println!("{}: {:?}", report.root.display(), report.outcome);
//!     }
//!     Ok(())
//! }
//! ```

mod batch;
mod chunker;
mod error;
mod hash;
mod language;
mod metadata;
mod orchestrator;
mod pipeline;
mod secrets;
mod stats;
mod walker;

pub use batch::BatchBuffer;
pub use chunker::{Chunk, Chunker, LineChunker, DEFAULT_MAX_LINES};
pub use error::{IndexerError, Result};
pub use hash::{compute_root_hash, relative_path};
pub use language::{language_for_path, ExtensionDetector, LanguageDetector, UNKNOWN};
pub use metadata::{JsonMetadataStore, MetadataStore, RootMetadata, METADATA_FILE_NAME};
pub use orchestrator::{
    Collaborators, IndexOptions, Orchestrator, RootOutcome, RootReport, DEFAULT_BATCH_SIZE,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS,
};
pub use pipeline::IndexJob;
pub use secrets::{FileVerdict, Finding, PatternSecretsScanner, SecretsScanner};
pub use stats::RunStats;
pub use walker::{is_binary, FsWalker, WalkEntry, WalkStream, Walker};
