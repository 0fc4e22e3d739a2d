use crate::batch::BatchBuffer;
use crate::chunker::{Chunker, LineChunker};
use crate::hash::compute_root_hash;
use crate::language::{ExtensionDetector, LanguageDetector};
use crate::metadata::{unix_now_secs, JsonMetadataStore, MetadataStore, RootMetadata};
use crate::pipeline::{job_for, IndexJob, RunContext};
use crate::secrets::{PatternSecretsScanner, SecretsScanner};
use crate::stats::{RunCounters, RunStats};
use crate::walker::{FsWalker, Walker};
use crate::{IndexerError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use swarm_embeddings::Embedder;
use swarm_search_index::SearchIndex;
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Long-lived workers per root
    pub workers: usize,
    /// Records per search-index write
    pub batch_size: usize,
    /// Bound of the shared job queue
    pub queue_capacity: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl IndexOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// How a single root's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootOutcome {
    /// Content hash matched the last run; nothing was walked.
    Unchanged,
    Indexed(RunStats),
    /// Root-level failure; sibling roots are unaffected.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootReport {
    pub root: PathBuf,
    pub outcome: RootOutcome,
}

/// Pluggable pieces of the per-file pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub walker: Arc<dyn Walker>,
    pub detector: Arc<dyn LanguageDetector>,
    pub secrets: Arc<dyn SecretsScanner>,
    pub chunker: Arc<dyn Chunker>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            walker: Arc::new(FsWalker::default()),
            detector: Arc::new(ExtensionDetector),
            secrets: Arc::new(PatternSecretsScanner),
            chunker: Arc::new(LineChunker::default()),
            metadata: Arc::new(JsonMetadataStore),
        }
    }
}

/// Drives incremental indexing of whole roots into the search index.
pub struct Orchestrator {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SearchIndex>,
    collaborators: Collaborators,
    schema_ready: OnceCell<()>,
}

impl Orchestrator {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            embedder,
            index,
            collaborators: Collaborators::default(),
            schema_ready: OnceCell::new(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Index every root in turn.
    ///
    /// Root-level failures are reported per root and do not stop the others. The only error
    /// returned is [`IndexerError::Cancelled`], in which case the cancelled root's metadata is
    /// left untouched.
    pub async fn index_roots(
        &self,
        cancel: &CancellationToken,
        roots: &[PathBuf],
        options: &IndexOptions,
    ) -> Result<Vec<RootReport>> {
        let mut reports = Vec::with_capacity(roots.len());
        for root in roots {
            if cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            let outcome = match self.index_root(cancel, root, options).await {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => {
                    log::info!("Indexing of {} cancelled", root.display());
                    return Err(IndexerError::Cancelled);
                }
                Err(err) => {
                    log::error!("Failed to index {}: {err}", root.display());
                    RootOutcome::Failed(err.to_string())
                }
            };
            reports.push(RootReport {
                root: root.clone(),
                outcome,
            });
        }
        Ok(reports)
    }

    async fn index_root(
        &self,
        cancel: &CancellationToken,
        root: &Path,
        options: &IndexOptions,
    ) -> Result<RootOutcome> {
        let root = validate_root(root).await?;
        let collab = &self.collaborators;

        let previous = collab.metadata.load_previous(&root).await?;
        let previous_hash = previous.as_ref().and_then(|m| m.content_hash.clone());
        let current_hash = compute_root_hash(collab.walker.as_ref(), &root, cancel).await?;
        if previous_hash.as_deref() == Some(current_hash.as_str()) {
            log::info!("{} unchanged since last run, skipping", root.display());
            return Ok(RootOutcome::Unchanged);
        }

        self.ensure_schema(cancel).await?;

        let start = Instant::now();
        let project_type = {
            let detector = Arc::clone(&collab.detector);
            let root = root.clone();
            tokio::task::spawn_blocking(move || detector.detect_project(&root))
                .await
                .map_err(|e| IndexerError::Other(format!("project detection failed: {e}")))?
        };
        log::info!(
            "Indexing {} ({project_type}) with {} workers",
            root.display(),
            options.workers.max(1)
        );

        let mut stream = collab.walker.walk(&root)?;

        let ctx = Arc::new(RunContext {
            root_label: root.display().to_string(),
            project_type: project_type.clone(),
            indexed_at: unix_now_secs(),
            embedder: Arc::clone(&self.embedder),
            index: Arc::clone(&self.index),
            collaborators: collab.clone(),
            buffer: BatchBuffer::new(options.batch_size),
            counters: RunCounters::default(),
            cancel: cancel.clone(),
        });

        let (tx, rx) = mpsc::channel::<IndexJob>(options.queue_capacity.max(1));
        let jobs = Arc::new(Mutex::new(rx));
        let workers: Vec<_> = (0..options.workers.max(1))
            .map(|id| tokio::spawn(Arc::clone(&ctx).work(id, Arc::clone(&jobs))))
            .collect();
        drop(jobs);

        let mut walked: Vec<String> = Vec::new();
        loop {
            let entry = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                entry = stream.next() => entry,
            };
            let Some(entry) = entry else { break };

            let job = job_for(&root, entry.path);
            let relative = job.relative_path.clone();
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(job) => sent,
            };
            if sent.is_err() {
                break;
            }
            walked.push(relative);
        }
        drop(tx);
        drop(stream);

        for handle in workers {
            if let Err(err) = handle.await {
                log::error!("Worker task failed: {err}");
            }
        }

        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        ctx.flush(ctx.buffer.take_remaining()).await?;

        walked.sort_unstable();
        walked.dedup();
        let previous_paths = previous.map(|m| m.indexed_paths).unwrap_or_default();
        let unremoved = self.remove_gone_paths(&ctx, &previous_paths, &walked).await?;
        let queued = walked.len();
        let mut indexed_paths = walked;
        if !unremoved.is_empty() {
            indexed_paths.extend(unremoved);
            indexed_paths.sort_unstable();
        }

        ctx.counters
            .set_time_ms(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));
        let stats = ctx.counters.snapshot();

        let content_hash = if stats.batches_failed == 0 && stats.files_failed == 0 {
            Some(current_hash)
        } else {
            log::warn!(
                "{} batch(es) and {} file(s) failed for {}; keeping previous content hash so the next run re-indexes",
                stats.batches_failed,
                stats.files_failed,
                root.display()
            );
            previous_hash
        };
        collab
            .metadata
            .save_run(
                &root,
                &RootMetadata {
                    content_hash,
                    last_indexed: ctx.indexed_at,
                    project_type,
                    stats: stats.clone(),
                    indexed_paths,
                },
            )
            .await?;

        log::info!(
            "Indexed {}: {queued} queued, {} processed, {} failed, {} skipped, {} removed, {} chunks in {}ms",
            root.display(),
            stats.files_processed,
            stats.files_failed,
            stats.files_skipped,
            stats.files_removed,
            stats.chunks_upserted,
            stats.time_ms
        );
        Ok(RootOutcome::Indexed(stats))
    }

    /// Delete the records of paths the last run walked but this one did not. Returns the paths
    /// whose removal failed so the next run tries again.
    async fn remove_gone_paths(
        &self,
        ctx: &RunContext,
        previous: &[String],
        walked: &[String],
    ) -> Result<Vec<String>> {
        let mut unremoved = Vec::new();
        for path in previous {
            if walked.binary_search(path).is_ok() {
                continue;
            }
            match self
                .index
                .delete_by_path(&ctx.cancel, &ctx.root_label, path)
                .await
            {
                Ok(removed) => {
                    log::debug!("Removed {removed} records of deleted file {path}");
                    ctx.counters.file_removed();
                }
                Err(err) if err.is_cancelled() => return Err(IndexerError::Cancelled),
                Err(err) => {
                    log::warn!("Failed to remove records of deleted file {path}: {err}");
                    ctx.counters.file_failed();
                    unremoved.push(path.clone());
                }
            }
        }
        Ok(unremoved)
    }

    async fn ensure_schema(&self, cancel: &CancellationToken) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                self.index.ensure_schema(cancel).await?;
                Ok::<_, IndexerError>(())
            })
            .await?;
        Ok(())
    }
}

async fn validate_root(root: &Path) -> Result<PathBuf> {
    let canonical = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| IndexerError::InvalidRoot(format!("{}: {e}", root.display())))?;
    let meta = tokio::fs::metadata(&canonical)
        .await
        .map_err(|e| IndexerError::InvalidRoot(format!("{}: {e}", root.display())))?;
    if !meta.is_dir() {
        return Err(IndexerError::InvalidRoot(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    Ok(canonical)
}
