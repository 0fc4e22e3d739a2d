//! # Swarm Search Index
//!
//! Batched writes and hybrid queries against a Typesense-compatible collection of chunk records.
//!
//! ## Operations
//!
//! ```text
//! ensure_schema   GET /collections/{c} ──404──> POST /collections
//! upsert_batch    records ──chunks(batch_size)──> POST .../documents/import?action=upsert
//! search          POST /multi_search (q on content + optional vector_query on embedding)
//! delete_by_path  DELETE .../documents?filter_by=project_root:=`...` && path:=`...`
//! ```
//!
//! Record ids are `record_id(project_root, path, start_line)`, so re-indexing a chunk overwrites it
//! in place and roots sharing a relative path never collide.

mod client;
mod error;
mod index;
mod record;
mod schema;

pub use client::{
    SearchIndexClient, SearchIndexConfig, DEFAULT_BATCH_SIZE, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_DIM, DEFAULT_URL,
};
pub use error::{Result, SearchIndexError};
pub use index::SearchIndex;
pub use record::{record_id, IndexedChunkRecord, SearchHit};
pub use schema::{CollectionSchema, FieldSchema};
