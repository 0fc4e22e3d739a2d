use crate::rate_limit::TokenBucket;
use crate::retry::RetryPolicy;
use crate::wire::{
    ApiErrorEnvelope, BatchEmbedContentsRequest, BatchEmbedContentsResponse, EmbedContentRequest,
    EmbedContentResponse,
};
use crate::{Embedder, EmbeddingError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MODEL: &str = "gemini-embedding-001";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_RATE_LIMIT_RPM: u32 = 60;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Outbound request budget shared by all callers of the client.
    pub requests_per_minute: u32,
    /// Requested vector length; responses of a different length are rejected.
    pub dimensions: Option<usize>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl EmbeddingConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_minute: DEFAULT_RATE_LIMIT_RPM,
            dimensions: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = if requests_per_minute == 0 {
            DEFAULT_RATE_LIMIT_RPM
        } else {
            requests_per_minute
        };
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Rate-limited, retrying client for the Gemini embeddings API.
///
/// One instance owns one token bucket; share the client (e.g. behind an `Arc`) to share the
/// request budget across workers.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
    limiter: TokenBucket,
    model_path: String,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "missing embedding API key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(config.api_key.trim()).map_err(|err| {
                EmbeddingError::InvalidInput(format!("invalid embedding API key: {err}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        let limiter = TokenBucket::per_minute(config.requests_per_minute);
        let model_path = format!("models/{}", config.model);
        log::debug!(
            "embedding client: model={} rpm={} max_attempts={}",
            config.model,
            config.requests_per_minute,
            config.retry.max_attempts
        );

        Ok(Self {
            http,
            config,
            limiter,
            model_path,
        })
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Embed a single text.
    pub async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "text cannot be empty".to_string(),
            ));
        }

        let url = format!("{}/{}:embedContent", self.config.base_url, self.model_path);
        let request = EmbedContentRequest::new(text, None, self.config.dimensions);
        let response: EmbedContentResponse = self.post_with_retry(cancel, &url, &request).await?;
        let vector = response.embedding.values;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    /// Embed many texts with one request. Output order matches input order.
    ///
    /// An empty input returns an empty output without touching the network.
    pub async fn embed_batch(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(index) = texts.iter().position(|text| text.is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "text at index {index} is empty"
            )));
        }

        let url = format!(
            "{}/{}:batchEmbedContents",
            self.config.base_url, self.model_path
        );
        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| {
                    EmbedContentRequest::new(
                        text,
                        Some(self.model_path.as_str()),
                        self.config.dimensions,
                    )
                })
                .collect(),
        };
        let response: BatchEmbedContentsResponse =
            self.post_with_retry(cancel, &url, &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::Decode(format!(
                "received {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect();
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(EmbeddingError::Decode("empty embedding vector".to_string()));
        }
        match self.config.dimensions {
            Some(expected) if expected != vector.len() => Err(EmbeddingError::Decode(format!(
                "expected {expected}-dimensional embedding, got {}",
                vector.len()
            ))),
            _ => Ok(()),
        }
    }

    async fn post_with_retry<B, R>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.limiter.wait(cancel).await?;

            let err = match self.post_once(cancel, url, body).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                log::warn!("embedding request failed after {attempt} attempts: {err}");
                return Err(EmbeddingError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let backoff = policy.backoff_after(attempt);
            log::debug!("embedding attempt {attempt} failed ({err}); retrying in {backoff:?}");
            tokio::select! {
                _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn post_once<B, R>(&self, cancel: &CancellationToken, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self.http.post(url).json(body);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
            bytes = response.bytes() => bytes?,
        };

        if !status.is_success() {
            return Err(self.upstream_error(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes)
            .map_err(|err| EmbeddingError::Decode(format!("failed to parse response: {err}")))
    }

    fn upstream_error(&self, status: u16, body: &[u8]) -> EmbeddingError {
        let message = match serde_json::from_slice::<ApiErrorEnvelope>(body) {
            Ok(envelope) if !envelope.error.message.is_empty() => {
                if envelope.error.status.is_empty() {
                    envelope.error.message
                } else {
                    format!(
                        "{} (code={}, status={})",
                        envelope.error.message, envelope.error.code, envelope.error.status
                    )
                }
            }
            _ => String::from_utf8_lossy(body)
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect(),
        };
        EmbeddingError::Upstream {
            status,
            message,
            retryable: self.config.retry.is_retryable_status(status),
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vec<f32>> {
        EmbeddingClient::embed(self, cancel, text).await
    }

    async fn embed_batch(
        &self,
        cancel: &CancellationToken,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        EmbeddingClient::embed_batch(self, cancel, texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_follow_public_api() {
        let config = EmbeddingConfig::new("key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.requests_per_minute, DEFAULT_RATE_LIMIT_RPM);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn zero_rate_limit_and_blank_model_keep_defaults() {
        let config = EmbeddingConfig::new("key")
            .with_rate_limit(0)
            .with_model("  ")
            .with_base_url("http://localhost:9000/");
        assert_eq!(config.requests_per_minute, DEFAULT_RATE_LIMIT_RPM);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, "http://localhost:9000");
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = EmbeddingClient::new(EmbeddingConfig::new(" "))
            .err()
            .expect("missing key");
        assert!(matches!(err, EmbeddingError::InvalidInput(_)));
    }

    #[test]
    fn upstream_error_prefers_structured_message() {
        let client = EmbeddingClient::new(EmbeddingConfig::new("key")).expect("client");
        let err = client.upstream_error(
            429,
            br#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        match err {
            EmbeddingError::Upstream {
                status,
                message,
                retryable,
            } => {
                assert_eq!(status, 429);
                assert!(message.contains("quota exceeded"));
                assert!(message.contains("RESOURCE_EXHAUSTED"));
                assert!(retryable);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = client.upstream_error(400, b"bad request");
        assert!(matches!(
            err,
            EmbeddingError::Upstream {
                status: 400,
                retryable: false,
                ..
            }
        ));
    }
}
