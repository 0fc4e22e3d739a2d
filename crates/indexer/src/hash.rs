use crate::metadata::METADATA_FILE_NAME;
use crate::walker::Walker;
use crate::{IndexerError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio_util::sync::CancellationToken;

/// Fingerprint of a root's file set: SHA-256 over the sorted `(relative path, size, mtime)` of
/// every walked file. File contents are never read, so this stays cheap on large trees.
pub async fn compute_root_hash(
    walker: &dyn Walker,
    root: &Path,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut stream = walker.walk(root)?;
    let mut entries: Vec<(String, u64, u128)> = Vec::new();

    loop {
        let entry = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IndexerError::Cancelled),
            entry = stream.next() => entry,
        };
        let Some(entry) = entry else { break };

        let relative = relative_path(root, &entry.path);
        if relative == METADATA_FILE_NAME {
            continue;
        }
        let mtime_ns = entry
            .modified
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        entries.push((relative, entry.size, mtime_ns));
    }

    entries.sort_unstable();

    let mut hasher = Sha256::new();
    for (relative, size, mtime_ns) in &entries {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(size.to_le_bytes());
        hasher.update(mtime_ns.to_le_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `/`-separated path of `path` below `root`; paths outside the root are kept as given.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
