use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const RECORD_ID_HEX_LEN: usize = 32;

/// One searchable chunk as stored in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunkRecord {
    /// `record_id(project_root, path, start_line)`; re-indexing the same chunk overwrites it.
    pub id: String,
    /// Path relative to the indexed root, `/`-separated.
    pub path: String,
    pub project_root: String,
    pub project_type: String,
    pub language: String,
    pub chunk_type: String,
    pub content: String,
    /// Omitted from search responses.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// 1-indexed, inclusive.
    pub start_line: u32,
    /// 1-indexed, inclusive.
    pub end_line: u32,
    /// Unix seconds.
    pub indexed_at: i64,
}

/// Stable id of the chunk starting at `start_line` of `relative_path` under `project_root`.
pub fn record_id(project_root: &str, relative_path: &str, start_line: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_root.as_bytes());
    hasher.update(b"\0");
    hasher.update(relative_path.as_bytes());
    hasher.update(b":");
    hasher.update(start_line.to_string().as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(RECORD_ID_HEX_LEN);
    id
}

/// A ranked search result. `score` is whatever the backend reports; results are never re-ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: IndexedChunkRecord,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_stable_per_path_and_line() {
        let first = record_id("/repo", "src/lib.rs", 10);
        assert_eq!(first, record_id("/repo", "src/lib.rs", 10));
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn record_id_distinguishes_line_and_path() {
        assert_ne!(record_id("/repo", "src/lib.rs", 10), record_id("/repo", "src/lib.rs", 11));
        assert_ne!(record_id("/repo", "src/lib.rs", 10), record_id("/repo", "src/main.rs", 10));
        // Without the separator both would hash "a12".
        assert_ne!(record_id("/repo", "a1", 2), record_id("/repo", "a", 12));
    }

    #[test]
    fn record_id_distinguishes_roots() {
        assert_ne!(record_id("/a", "README.md", 1), record_id("/b", "README.md", 1));
        assert_ne!(record_id("/a", "b/c.md", 1), record_id("/a/b", "c.md", 1));
    }

    #[test]
    fn search_documents_may_omit_embedding() {
        let json = serde_json::json!({
            "id": "abc",
            "path": "README.md",
            "project_root": "/repo",
            "project_type": "rust",
            "language": "markdown",
            "chunk_type": "header",
            "content": "# Title",
            "start_line": 1,
            "end_line": 1,
            "indexed_at": 1700000000
        });
        let record: IndexedChunkRecord = serde_json::from_value(json).expect("decode");
        assert!(record.embedding.is_empty());
        assert_eq!(record.path, "README.md");
    }
}
