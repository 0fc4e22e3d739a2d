use crate::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Text to vector conversion as seen by the indexing pipeline.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<f32>>;

    /// One vector per input, in input order.
    async fn embed_batch(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>>;
}
