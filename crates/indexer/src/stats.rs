use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Statistics of one root's indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Files that went through the whole pipeline (including files with zero chunks)
    pub files_processed: usize,

    /// Files whose read, chunk, embed or stale-record removal failed
    pub files_failed: usize,

    /// Files skipped by the secrets scanner or for not being UTF-8
    pub files_skipped: usize,

    /// Records acknowledged by the search index
    pub chunks_upserted: usize,

    /// Batch flushes the search index rejected
    pub batches_failed: usize,

    /// Files gone since the last run whose records were deleted
    #[serde(default)]
    pub files_removed: usize,

    /// Wall time of the run in milliseconds
    pub time_ms: u64,
}

/// Lock-free counters shared by the workers of one run.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    files_processed: AtomicUsize,
    files_failed: AtomicUsize,
    files_skipped: AtomicUsize,
    chunks_upserted: AtomicUsize,
    batches_failed: AtomicUsize,
    files_removed: AtomicUsize,
    time_ms: AtomicU64,
}

impl RunCounters {
    pub fn file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunks_upserted(&self, count: usize) {
        self.chunks_upserted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_removed(&self) {
        self.files_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_time_ms(&self, ms: u64) {
        self.time_ms.store(ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStats {
        RunStats {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            chunks_upserted: self.chunks_upserted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            time_ms: self.time_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot_accumulates() {
        let counters = RunCounters::default();
        counters.file_processed();
        counters.file_processed();
        counters.file_failed();
        counters.file_skipped();
        counters.chunks_upserted(7);
        counters.chunks_upserted(3);
        counters.batch_failed();
        counters.file_removed();
        counters.set_time_ms(42);

        assert_eq!(
            counters.snapshot(),
            RunStats {
                files_processed: 2,
                files_failed: 1,
                files_skipped: 1,
                chunks_upserted: 10,
                batches_failed: 1,
                files_removed: 1,
                time_ms: 42,
            }
        );
    }
}
