use std::sync::Mutex;
use swarm_search_index::IndexedChunkRecord;

/// Records waiting to be flushed to the search index.
///
/// Workers append under the lock and take away every full batch; the flush itself happens after
/// the lock is released.
#[derive(Debug)]
pub struct BatchBuffer {
    batch_size: usize,
    pending: Mutex<Vec<IndexedChunkRecord>>,
}

impl BatchBuffer {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Mutex::new(Vec::with_capacity(batch_size)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Append `records` and detach every batch that reached `batch_size`, oldest first.
    pub fn push(&self, records: Vec<IndexedChunkRecord>) -> Vec<Vec<IndexedChunkRecord>> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.extend(records);

        let mut full = Vec::new();
        while pending.len() >= self.batch_size {
            let rest = pending.split_off(self.batch_size);
            full.push(std::mem::replace(&mut *pending, rest));
        }
        full
    }

    /// Detach whatever is left (a partial batch at the end of a run).
    pub fn take_remaining(&self) -> Vec<IndexedChunkRecord> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_search_index::record_id;

    fn records(path: &str, count: u32) -> Vec<IndexedChunkRecord> {
        (1..=count)
            .map(|line| IndexedChunkRecord {
                id: record_id("/r", path, line),
                path: path.to_string(),
                project_root: "/r".to_string(),
                project_type: "unknown".to_string(),
                language: "unknown".to_string(),
                chunk_type: "paragraph".to_string(),
                content: format!("line {line}"),
                embedding: vec![0.0],
                start_line: line,
                end_line: line,
                indexed_at: 0,
            })
            .collect()
    }

    #[test]
    fn detaches_exact_batches_across_uneven_appends() {
        let buffer = BatchBuffer::new(5);
        let mut sizes = Vec::new();
        for (path, count) in [("a", 3), ("b", 4), ("c", 1), ("d", 4)] {
            sizes.extend(buffer.push(records(path, count)).iter().map(Vec::len));
        }
        sizes.push(buffer.take_remaining().len());

        assert_eq!(sizes, vec![5, 5, 2]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn one_large_append_yields_several_batches_in_order() {
        let buffer = BatchBuffer::new(2);
        let batches = buffer.push(records("big", 5));

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].start_line, 1);
        assert_eq!(batches[1][0].start_line, 3);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        let buffer = BatchBuffer::new(0);
        assert_eq!(buffer.batch_size(), 1);
        assert_eq!(buffer.push(records("a", 2)).len(), 2);
    }
}
