use crate::{IndexedChunkRecord, Result, SearchHit};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Chunk collection operations the indexing pipeline and the CLI depend on.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn ensure_schema(&self, cancel: &CancellationToken) -> Result<()>;

    /// Insert or overwrite by id. Empty input is a no-op.
    async fn upsert_batch(
        &self,
        cancel: &CancellationToken,
        records: &[IndexedChunkRecord],
    ) -> Result<usize>;

    async fn search(
        &self,
        cancel: &CancellationToken,
        query_text: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Remove every record of `relative_path` under `project_root`.
    async fn delete_by_path(
        &self,
        cancel: &CancellationToken,
        project_root: &str,
        relative_path: &str,
    ) -> Result<u64>;
}
