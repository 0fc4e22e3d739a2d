use crate::batch::BatchBuffer;
use crate::hash::relative_path;
use crate::orchestrator::Collaborators;
use crate::stats::RunCounters;
use crate::{IndexerError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use swarm_embeddings::Embedder;
use swarm_search_index::{record_id, IndexedChunkRecord, SearchIndex, SearchIndexError};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// One file queued for a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexJob {
    pub path: PathBuf,
    /// `/`-separated path below the root; the record path and id key.
    pub relative_path: String,
}

/// State shared by every worker of one root's run.
pub(crate) struct RunContext {
    pub root_label: String,
    pub project_type: String,
    pub indexed_at: i64,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn SearchIndex>,
    pub collaborators: Collaborators,
    pub buffer: BatchBuffer,
    pub counters: RunCounters,
    pub cancel: CancellationToken,
}

enum FileOutcome {
    Indexed,
    Skipped(String),
}

impl RunContext {
    /// Worker loop: dequeue until the queue is closed and drained or the run is cancelled.
    pub async fn work(
        self: Arc<Self>,
        worker_id: usize,
        jobs: Arc<Mutex<mpsc::Receiver<IndexJob>>>,
    ) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let job = {
                let mut rx = jobs.lock().await;
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    job = rx.recv() => job,
                }
            };
            let Some(job) = job else { break };

            match self.process_file(&job).await {
                Ok(FileOutcome::Indexed) => self.counters.file_processed(),
                Ok(FileOutcome::Skipped(reason)) => {
                    log::debug!("Skipping {}: {reason}", job.relative_path);
                    self.counters.file_skipped();
                }
                Err(err) if err.is_cancelled() => break,
                Err(err) => {
                    log::warn!("Failed to index {}: {err}", job.relative_path);
                    self.counters.file_failed();
                }
            }
        }
        log::trace!("Worker {worker_id} stopped");
    }

    /// Skip-check, read, redact, detect language, chunk, embed once for the whole file, drop the
    /// file's previous records, then append the new ones and flush whatever batches filled up.
    async fn process_file(&self, job: &IndexJob) -> Result<FileOutcome> {
        let collab = &self.collaborators;

        let verdict = collab.secrets.scan_file(&job.path);
        if verdict.should_skip {
            return Ok(FileOutcome::Skipped(
                verdict.reason.unwrap_or_else(|| "secrets".to_string()),
            ));
        }

        let bytes = tokio::fs::read(&job.path).await?;
        let Ok(content) = String::from_utf8(bytes) else {
            self.clear_previous(job).await?;
            return Ok(FileOutcome::Skipped("not valid UTF-8".to_string()));
        };

        let findings = collab.secrets.scan_content(&content);
        let content = if findings.is_empty() {
            content
        } else {
            log::info!(
                "Redacted {} secret(s) in {}",
                findings.len(),
                job.relative_path
            );
            collab.secrets.redact(&content, &findings)
        };

        let language = collab.detector.detect_language(&job.path);
        let chunks = collab.chunker.chunk(&content, &language)?;
        if chunks.is_empty() {
            self.clear_previous(job).await?;
            return Ok(FileOutcome::Indexed);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&self.cancel, &texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IndexerError::Other(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        // Chunks that moved or disappeared since the last run would otherwise stay searchable.
        self.clear_previous(job).await?;

        let records: Vec<IndexedChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunkRecord {
                id: record_id(&self.root_label, &job.relative_path, chunk.start_line),
                path: job.relative_path.clone(),
                project_root: self.root_label.clone(),
                project_type: self.project_type.clone(),
                language: language.clone(),
                chunk_type: chunk.chunk_type,
                content: chunk.content,
                embedding,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                indexed_at: self.indexed_at,
            })
            .collect();

        for batch in self.buffer.push(records) {
            self.flush(batch).await?;
        }
        Ok(FileOutcome::Indexed)
    }

    async fn clear_previous(&self, job: &IndexJob) -> Result<()> {
        let removed = self
            .index
            .delete_by_path(&self.cancel, &self.root_label, &job.relative_path)
            .await?;
        if removed > 0 {
            log::trace!("Cleared {removed} old records of {}", job.relative_path);
        }
        Ok(())
    }

    /// Write one batch. Failures are counted and logged, never propagated, except cancellation.
    pub async fn flush(&self, batch: Vec<IndexedChunkRecord>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        match self.index.upsert_batch(&self.cancel, &batch).await {
            Ok(written) => {
                log::debug!("Flushed {written} records for {}", self.root_label);
                self.counters.chunks_upserted(written);
                Ok(())
            }
            Err(err) if err.is_cancelled() => Err(IndexerError::Cancelled),
            Err(err) => {
                if let SearchIndexError::BatchFailed { written, .. } = &err {
                    self.counters.chunks_upserted(*written);
                }
                log::warn!(
                    "Dropping batch of {} records for {}: {err}",
                    batch.len(),
                    self.root_label
                );
                self.counters.batch_failed();
                Ok(())
            }
        }
    }
}

pub(crate) fn job_for(root: &std::path::Path, path: PathBuf) -> IndexJob {
    let relative_path = relative_path(root, &path);
    IndexJob {
        path,
        relative_path,
    }
}
