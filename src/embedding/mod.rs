//! Embedding client abstraction and the HTTP feature-extraction adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

pub mod scheduler;

pub use scheduler::{BatchScheduler, EmbeddedChunk, FailurePolicy};

/// Errors raised by a single embedding provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("unexpected provider response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a payload that is not an embedding vector.
    #[error("malformed embedding payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether another attempt is worthwhile. Rate limits and server-side
    /// failures are transient; auth and malformed-request rejections are not.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Malformed(_) => false,
        }
    }
}

/// Errors surfaced by [`EmbeddingClient::embed`] after retry handling.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Every attempt failed with a transient error; the last cause is attached.
    #[error("embedding failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The error raised by the final attempt.
        #[source]
        source: ProviderError,
    },
    /// Provider rejected the request in a way retrying cannot fix.
    #[error("embedding provider rejected the request: {0}")]
    Fatal(#[source] ProviderError),
    /// Returned vector does not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the server is configured for.
        expected: usize,
        /// Dimension the provider actually returned.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for the supplied text.
    ///
    /// Whitespace-only input yields an empty vector without a provider call.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimensionality of the vectors this client produces.
    fn dimension(&self) -> usize;
}

/// Retry schedule for transient provider failures: linear backoff,
/// `attempt * base_delay` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay multiplied by the attempt number (2s, then 4s, ...).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// HTTP client for feature-extraction style embedding endpoints.
pub struct HttpEmbeddingClient {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: String,
    pub(crate) dimension: usize,
    pub(crate) retry: RetryPolicy,
}

impl HttpEmbeddingClient {
    /// Construct a client for the given endpoint and expected vector dimension.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("notewave/0.1")
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            dimension,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry schedule. A zero `max_attempts` is treated as one,
    /// so at least one request is always made.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "inputs": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UnexpectedStatus { status, body });
        }

        let payload: Value = response.json().await?;
        parse_vector(payload)
    }
}

/// Accept both response shapes feature-extraction endpoints produce: a flat
/// vector for single input, or one row per input.
fn parse_vector(payload: Value) -> Result<Vec<f32>, ProviderError> {
    let row = match payload {
        Value::Array(items) if items.first().map(Value::is_array).unwrap_or(false) => items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("empty embedding batch".into()))?,
        other @ Value::Array(_) => other,
        other => {
            return Err(ProviderError::Malformed(format!(
                "expected an array, got {other}"
            )));
        }
    };

    row.as_array()
        .ok_or_else(|| ProviderError::Malformed("embedding row is not an array".into()))?
        .iter()
        .map(|value| {
            value
                .as_f64()
                .map(|number| number as f32)
                .ok_or_else(|| ProviderError::Malformed("non-numeric vector component".into()))
        })
        .collect()
}

/// Collapse newlines and trim, mirroring what the provider expects for
/// sentence-level embeddings.
fn normalize(text: &str) -> String {
    text.replace('\n', " ").trim().to_string()
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for attempt in 1..=self.retry.max_attempts {
            match self.request_embedding(&cleaned).await {
                Ok(vector) => {
                    if vector.len() != self.dimension {
                        return Err(EmbeddingError::DimensionMismatch {
                            expected: self.dimension,
                            actual: vector.len(),
                        });
                    }
                    return Ok(vector);
                }
                Err(error) if error.is_retryable() => {
                    tracing::warn!(
                        stage = "embedding",
                        attempt,
                        outcome = "retry",
                        error = %error,
                        "Embedding attempt failed"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.base_delay * attempt).await;
                    }
                    last_error = Some(error);
                }
                Err(error) => {
                    tracing::error!(
                        stage = "embedding",
                        attempt,
                        outcome = "fatal",
                        error = %error,
                        "Embedding request rejected"
                    );
                    return Err(EmbeddingError::Fatal(error));
                }
            }
        }

        Err(EmbeddingError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            source: last_error.expect("retry loop exited without recording an error"),
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(server: &MockServer, dimension: usize) -> HttpEmbeddingClient {
        HttpEmbeddingClient {
            client: reqwest::Client::builder()
                .user_agent("notewave-test")
                .build()
                .expect("client"),
            endpoint: format!("{}/embed", server.base_url()),
            api_key: "test-key".into(),
            dimension,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    #[tokio::test]
    async fn embeds_text_and_parses_flat_vector() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .json_body(serde_json::json!({ "inputs": "hello world" }));
                then.status(200).json_body(serde_json::json!([0.1, 0.2, 0.3]));
            })
            .await;

        let client = test_client(&server, 3);
        let vector = client.embed("hello\nworld").await.expect("embedding");

        mock.assert();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn parses_nested_row_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200)
                    .json_body(serde_json::json!([[1.0, 0.0]]));
            })
            .await;

        let client = test_client(&server, 2);
        let vector = client.embed("hi").await.expect("embedding");
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn empty_text_short_circuits_without_a_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(serde_json::json!([0.0]));
            })
            .await;

        let client = test_client(&server, 1);
        let vector = client.embed("  \n \n ").await.expect("embedding");

        assert!(vector.is_empty());
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn two_transient_failures_then_success_uses_three_attempts() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let server = MockServer::start_async().await;
        // Rate-limit the first two attempts only; the counter gate keeps this
        // mock from matching the third request.
        static GATE: AtomicUsize = AtomicUsize::new(0);
        fn gate_first_two(_req: &httpmock::prelude::HttpMockRequest) -> bool {
            if GATE.load(Ordering::SeqCst) < 2 {
                GATE.fetch_add(1, Ordering::SeqCst);
                true
            } else {
                false
            }
        }
        let failures = server
            .mock_async(move |when, then| {
                when.method(POST).path("/embed").matches(gate_first_two);
                then.status(429).body("rate limited");
            })
            .await;
        let success = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(serde_json::json!([0.5, 0.5]));
            })
            .await;

        let client = test_client(&server, 2);
        let vector = client.embed("hello").await.expect("embedding");

        assert_eq!(vector, vec![0.5, 0.5]);
        failures.assert_hits(2);
        success.assert_hits(1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_cause() {
        let server = MockServer::start_async().await;
        let failures = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(503).body("unavailable");
            })
            .await;

        let client = test_client(&server, 2);
        let error = client.embed("hello").await.unwrap_err();

        assert!(matches!(
            error,
            EmbeddingError::RetriesExhausted { attempts: 3, .. }
        ));
        failures.assert_hits(3);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_makes_one_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(503).body("unavailable");
            })
            .await;

        let client = test_client(&server, 2).with_retry(RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::from_millis(1),
        });
        let error = client.embed("hello").await.unwrap_err();

        assert!(matches!(
            error,
            EmbeddingError::RetriesExhausted { attempts: 1, .. }
        ));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn fatal_status_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(401).body("bad credentials");
            })
            .await;

        let client = test_client(&server, 2);
        let error = client.embed("hello").await.unwrap_err();

        assert!(matches!(error, EmbeddingError::Fatal(_)));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(serde_json::json!([0.1, 0.2, 0.3]));
            })
            .await;

        let client = test_client(&server, 384);
        let error = client.embed("hello").await.unwrap_err();
        assert!(matches!(
            error,
            EmbeddingError::DimensionMismatch {
                expected: 384,
                actual: 3
            }
        ));
    }
}
