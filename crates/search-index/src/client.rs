use crate::schema::CollectionSchema;
use crate::{IndexedChunkRecord, Result, SearchHit, SearchIndex, SearchIndexError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_URL: &str = "http://localhost:8108";
pub const DEFAULT_COLLECTION: &str = "swarm-index";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_EMBEDDING_DIM: usize = 768;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";
const MAX_PER_PAGE: usize = 250;
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    pub base_url: String,
    pub api_key: String,
    pub collection: String,
    pub embedding_dim: usize,
    /// Maximum records per import request.
    pub batch_size: usize,
    pub timeout: Duration,
}

impl SearchIndexConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL, "")
    }
}

/// Client for a Typesense-compatible search backend holding chunk records.
pub struct SearchIndexClient {
    http: reqwest::Client,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    pub fn new(config: SearchIndexConfig) -> Result<Self> {
        if config.collection.trim().is_empty() {
            return Err(SearchIndexError::InvalidInput(
                "collection name cannot be empty".to_string(),
            ));
        }
        if config.embedding_dim == 0 {
            return Err(SearchIndexError::InvalidInput(
                "embedding dimension must be positive".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(config.api_key.trim()).map_err(|err| {
                SearchIndexError::InvalidInput(format!("invalid search API key: {err}"))
            })?,
        );
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SearchIndexConfig {
        &self.config
    }

    /// Create the collection unless it already exists.
    pub async fn ensure_schema(&self, cancel: &CancellationToken) -> Result<()> {
        let url = self.collection_url("");
        let (status, body) = self.send(cancel, self.http.get(&url)).await?;
        if status.is_success() {
            log::debug!("collection {} already exists", self.config.collection);
            return Ok(());
        }
        if status != StatusCode::NOT_FOUND {
            return Err(api_error(status, &body));
        }

        let schema = CollectionSchema::for_chunks(&self.config.collection, self.config.embedding_dim);
        let request = self
            .http
            .post(format!("{}/collections", self.config.base_url))
            .json(&schema);
        let (status, body) = self.send(cancel, request).await?;
        match status {
            s if s.is_success() => {
                log::info!(
                    "created collection {} ({}-dim embeddings)",
                    self.config.collection,
                    self.config.embedding_dim
                );
                Ok(())
            }
            // Another writer created it between our GET and POST.
            StatusCode::CONFLICT => Ok(()),
            _ => Err(api_error(status, &body)),
        }
    }

    /// Upsert records in groups of at most `batch_size`, in input order.
    ///
    /// Groups written before a failing group stay written. Returns the number of records written.
    pub async fn upsert_batch(
        &self,
        cancel: &CancellationToken,
        records: &[IndexedChunkRecord],
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.validate_records(records)?;

        let mut written = 0usize;
        for (group, chunk) in records.chunks(self.config.batch_size.max(1)).enumerate() {
            if cancel.is_cancelled() {
                return Err(SearchIndexError::BatchFailed {
                    group,
                    written,
                    source: Box::new(SearchIndexError::Cancelled),
                });
            }
            self.import_group(cancel, chunk).await.map_err(|err| {
                log::warn!("upsert group {group} ({} records) failed: {err}", chunk.len());
                SearchIndexError::BatchFailed {
                    group,
                    written,
                    source: Box::new(err),
                }
            })?;
            written += chunk.len();
        }

        log::debug!("upserted {written} records into {}", self.config.collection);
        Ok(written)
    }

    /// Hybrid lexical + vector query. The vector leg is skipped when `query_vector` is empty.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query_text: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let per_page = limit.min(MAX_PER_PAGE);
        let q = if query_text.trim().is_empty() {
            "*"
        } else {
            query_text
        };

        let mut search = serde_json::json!({
            "collection": self.config.collection,
            "q": q,
            "query_by": "content",
            "per_page": per_page,
            "exclude_fields": "embedding",
        });
        if !query_vector.is_empty() {
            search["vector_query"] = serde_json::Value::String(vector_query(query_vector, per_page));
        }
        let body = serde_json::json!({ "searches": [search] });

        let request = self
            .http
            .post(format!("{}/multi_search", self.config.base_url))
            .json(&body);
        let (status, bytes) = self.send(cancel, request).await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        let response: MultiSearchResponse = serde_json::from_slice(&bytes)?;
        let Some(result) = response.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(message) = result.error {
            return Err(SearchIndexError::Api {
                status: result.code.unwrap_or(400),
                message,
            });
        }

        Ok(result
            .hits
            .into_iter()
            .take(limit)
            .map(|hit| {
                let score = hit.score();
                SearchHit {
                    record: hit.document,
                    score,
                }
            })
            .collect())
    }

    /// Delete every record of `relative_path` under `project_root`. Returns the number removed.
    pub async fn delete_by_path(
        &self,
        cancel: &CancellationToken,
        project_root: &str,
        relative_path: &str,
    ) -> Result<u64> {
        if project_root.is_empty() || relative_path.is_empty() {
            return Err(SearchIndexError::InvalidInput(
                "project root and path cannot be empty".to_string(),
            ));
        }
        for value in [project_root, relative_path] {
            if value.contains('`') {
                return Err(SearchIndexError::InvalidInput(format!(
                    "filter value contains a backtick: {value}"
                )));
            }
        }

        let filter = format!("project_root:=`{project_root}` && path:=`{relative_path}`");
        let request = self
            .http
            .request(Method::DELETE, self.collection_url("/documents"))
            .query(&[("filter_by", filter.as_str())]);
        let (status, body) = self.send(cancel, request).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let response: DeleteResponse = serde_json::from_slice(&body)?;
        log::debug!("deleted {} records for {relative_path}", response.num_deleted);
        Ok(response.num_deleted)
    }

    fn validate_records(&self, records: &[IndexedChunkRecord]) -> Result<()> {
        for record in records {
            if record.id.is_empty() {
                return Err(SearchIndexError::InvalidInput(format!(
                    "record for {} has no id",
                    record.path
                )));
            }
            if record.embedding.len() != self.config.embedding_dim {
                return Err(SearchIndexError::InvalidInput(format!(
                    "record {} has {}-dimensional embedding, collection expects {}",
                    record.id,
                    record.embedding.len(),
                    self.config.embedding_dim
                )));
            }
        }
        Ok(())
    }

    async fn import_group(
        &self,
        cancel: &CancellationToken,
        records: &[IndexedChunkRecord],
    ) -> Result<()> {
        let mut jsonl = Vec::with_capacity(records.len() * 1024);
        for record in records {
            serde_json::to_writer(&mut jsonl, record)?;
            jsonl.push(b'\n');
        }

        let request = self
            .http
            .post(self.collection_url("/documents/import"))
            .query(&[("action", "upsert")])
            .header(CONTENT_TYPE, "text/plain")
            .body(jsonl);
        let (status, body) = self.send(cancel, request).await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        check_import_lines(&body, records.len())
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(SearchIndexError::Cancelled),
            response = request.send() => response?,
        };
        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(SearchIndexError::Cancelled),
            body = response.bytes() => body?,
        };
        Ok((status, body.to_vec()))
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{suffix}",
            self.config.base_url, self.config.collection
        )
    }
}

#[async_trait]
impl SearchIndex for SearchIndexClient {
    async fn ensure_schema(&self, cancel: &CancellationToken) -> Result<()> {
        SearchIndexClient::ensure_schema(self, cancel).await
    }

    async fn upsert_batch(
        &self,
        cancel: &CancellationToken,
        records: &[IndexedChunkRecord],
    ) -> Result<usize> {
        SearchIndexClient::upsert_batch(self, cancel, records).await
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        query_text: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        SearchIndexClient::search(self, cancel, query_text, query_vector, limit).await
    }

    async fn delete_by_path(
        &self,
        cancel: &CancellationToken,
        project_root: &str,
        relative_path: &str,
    ) -> Result<u64> {
        SearchIndexClient::delete_by_path(self, cancel, project_root, relative_path).await
    }
}

fn vector_query(vector: &[f32], k: usize) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("embedding:([{}], k:{k})", values.join(","))
}

/// The import endpoint answers 200 with one JSON status line per document.
fn check_import_lines(body: &[u8], expected: usize) -> Result<()> {
    let text = String::from_utf8_lossy(body);
    let mut seen = 0usize;
    let mut failed = 0usize;
    let mut first_error = None;

    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        seen += 1;
        let status: ImportLine = serde_json::from_str(line)?;
        if !status.success {
            failed += 1;
            if first_error.is_none() {
                first_error = Some(status.error.unwrap_or_else(|| "unknown error".to_string()));
            }
        }
    }

    if failed > 0 {
        return Err(SearchIndexError::Rejected {
            failed,
            total: expected,
            first_error: first_error.unwrap_or_default(),
        });
    }
    if seen != expected {
        return Err(SearchIndexError::Decode(format!(
            "import acknowledged {seen} of {expected} documents"
        )));
    }
    Ok(())
}

fn api_error(status: StatusCode, body: &[u8]) -> SearchIndexError {
    let message = serde_json::from_slice::<ApiMessage>(body)
        .map(|parsed| parsed.message)
        .unwrap_or_else(|_| {
            String::from_utf8_lossy(body)
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect()
        });
    SearchIndexError::Api {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ImportLine {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    num_deleted: u64,
}

#[derive(Debug, Deserialize)]
struct MultiSearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<Hit>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    document: IndexedChunkRecord,
    #[serde(default)]
    text_match: Option<f64>,
    #[serde(default)]
    vector_distance: Option<f64>,
    #[serde(default)]
    hybrid_search_info: Option<HybridSearchInfo>,
}

#[derive(Debug, Deserialize)]
struct HybridSearchInfo {
    rank_fusion_score: f64,
}

impl Hit {
    fn score(&self) -> f64 {
        if let Some(info) = &self.hybrid_search_info {
            return info.rank_fusion_score;
        }
        if let Some(text_match) = self.text_match {
            return text_match;
        }
        self.vector_distance
            .map(|distance| 1.0 - distance)
            .unwrap_or(0.0)
    }
}
