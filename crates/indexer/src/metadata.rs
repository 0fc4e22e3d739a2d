use crate::stats::RunStats;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sidecar written into every indexed root.
pub const METADATA_FILE_NAME: &str = ".swarm-indexer-metadata.json";

/// What a root remembers about its last run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootMetadata {
    /// Hash the next run compares against; `None` forces a full walk.
    pub content_hash: Option<String>,

    /// Unix seconds
    pub last_indexed: i64,

    pub project_type: String,

    #[serde(flatten)]
    pub stats: RunStats,

    /// Sorted relative paths walked by the last completed run. Paths missing from the next
    /// walk have their records deleted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexed_paths: Vec<String>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Full metadata of `root`, `None` if it was never indexed.
    async fn load(&self, root: &Path) -> Result<Option<RootMetadata>>;

    async fn save_run(&self, root: &Path, metadata: &RootMetadata) -> Result<()>;

    /// Like [`MetadataStore::load`], but an unreadable sidecar counts as absent so the root is
    /// simply re-indexed.
    async fn load_previous(&self, root: &Path) -> Result<Option<RootMetadata>> {
        match self.load(root).await {
            Ok(metadata) => Ok(metadata),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                log::warn!("Ignoring unreadable metadata for {}: {err}", root.display());
                Ok(None)
            }
        }
    }

    /// Last persisted content hash.
    async fn load_hash(&self, root: &Path) -> Result<Option<String>> {
        Ok(self.load_previous(root).await?.and_then(|m| m.content_hash))
    }
}

/// JSON sidecar in the root itself, replaced atomically on every save.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataStore;

impl JsonMetadataStore {
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(METADATA_FILE_NAME)
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn load(&self, root: &Path) -> Result<Option<RootMetadata>> {
        let path = Self::path_for(root);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save_run(&self, root: &Path, metadata: &RootMetadata) -> Result<()> {
        let path = Self::path_for(root);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(metadata)?;

        let written = write_then_rename(&tmp, &path, bytes).await;
        if written.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        written
    }
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: Vec<u8>) -> Result<()> {
    tokio::fs::write(tmp, bytes).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(tmp, std::fs::Permissions::from_mode(0o644)).await?;
    }
    tokio::fs::rename(tmp, path).await?;
    Ok(())
}

pub(crate) fn unix_now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
