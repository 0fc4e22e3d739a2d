use crate::{IndexerError, Result};
use ignore::WalkBuilder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;

/// A file yielded by a [`Walker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Lazy stream of walk entries; the producer stops once this is dropped.
#[derive(Debug)]
pub struct WalkStream {
    rx: mpsc::Receiver<WalkEntry>,
}

impl WalkStream {
    pub fn new(rx: mpsc::Receiver<WalkEntry>) -> Self {
        Self { rx }
    }

    /// Stream over a precomputed list of entries.
    pub fn from_entries(entries: Vec<WalkEntry>) -> Self {
        let (tx, rx) = mpsc::channel(entries.len().max(1));
        for entry in entries {
            // Capacity equals the entry count, so this cannot fill up.
            let _ = tx.try_send(entry);
        }
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<WalkEntry> {
        self.rx.recv().await
    }
}

/// Source of candidate files under a root, already filtered for ignore rules and binaries.
pub trait Walker: Send + Sync {
    /// Start walking `root`. Failing to start is a root-level error; entries that cannot be
    /// read later are skipped.
    fn walk(&self, root: &Path) -> Result<WalkStream>;
}

/// Filesystem walker (.gitignore aware, dot-directories and binaries skipped)
#[derive(Debug, Clone)]
pub struct FsWalker {
    max_file_size: u64,
    channel_capacity: usize,
}

impl FsWalker {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE_BYTES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn run(root: PathBuf, max_file_size: u64, tx: mpsc::Sender<WalkEntry>) {
        let mut builder = WalkBuilder::new(&root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false);
        builder.filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry));

        let mut yielded = 0usize;
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            if is_metadata_sidecar(path) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("Failed to stat {}: {e}", path.display());
                    continue;
                }
            };
            if meta.len() > max_file_size {
                log::debug!(
                    "Skipping large file {} ({} bytes > {})",
                    path.display(),
                    meta.len(),
                    max_file_size
                );
                continue;
            }

            match is_binary(path) {
                Ok(false) => {}
                Ok(true) => {
                    log::debug!("Skipping binary file {}", path.display());
                    continue;
                }
                Err(e) => {
                    log::warn!("Failed to probe {}: {e}", path.display());
                    continue;
                }
            }

            let walk_entry = WalkEntry {
                path: path.to_path_buf(),
                size: meta.len(),
                modified: meta.modified().ok(),
            };
            if tx.blocking_send(walk_entry).is_err() {
                log::debug!("Walk of {} abandoned by consumer", root.display());
                return;
            }
            yielded += 1;
        }

        log::debug!("Walk of {} yielded {yielded} files", root.display());
    }
}

impl Default for FsWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl Walker for FsWalker {
    fn walk(&self, root: &Path) -> Result<WalkStream> {
        let meta = std::fs::metadata(root)
            .map_err(|e| IndexerError::InvalidRoot(format!("{}: {e}", root.display())))?;
        if !meta.is_dir() {
            return Err(IndexerError::InvalidRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        std::fs::read_dir(root)
            .map_err(|e| IndexerError::InvalidRoot(format!("{}: {e}", root.display())))?;

        let (tx, rx) = mpsc::channel(self.channel_capacity.max(1));
        let root = root.to_path_buf();
        let max_file_size = self.max_file_size;
        tokio::task::spawn_blocking(move || Self::run(root, max_file_size, tx));
        Ok(WalkStream::new(rx))
    }
}

/// NUL byte within the first 8 KiB.
pub fn is_binary(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; BINARY_PROBE_BYTES];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(buf[..filled].contains(&0))
}

/// Dot-directories (`.git`, `.cache`, ...) are pruned; dotfiles are kept.
fn is_hidden_dir(entry: &ignore::DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir())
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// The sidecar and its temp file are written by the indexer itself.
fn is_metadata_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with(crate::metadata::METADATA_FILE_NAME))
}

const MAX_FILE_SIZE_BYTES: u64 = 10 * 1_048_576; // 10 MB
const BINARY_PROBE_BYTES: usize = 8 * 1024;
const DEFAULT_CHANNEL_CAPACITY: usize = 256;
