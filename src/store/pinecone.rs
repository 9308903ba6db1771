//! HTTP adapter for a Pinecone-style vector index.

use super::{DocumentFilter, RetrievalMatch, StoreError, VectorRecord, VectorStore};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;

/// Provider-imposed ceiling on vectors per upsert call; larger inputs are
/// re-batched into sequential requests.
const UPSERT_BATCH_SIZE: usize = 50;

/// Lightweight HTTP client for a Pinecone-style index.
pub struct PineconeStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl PineconeStore {
    /// Construct a client for the given index host.
    pub fn new(index_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder().user_agent("notewave/0.1").build()?;
        let base_url = normalize_base_url(index_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized vector index HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), StoreError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Vector store request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let total = records.len();
        let batch_count = total.div_ceil(UPSERT_BATCH_SIZE);
        for (batch_index, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let response = self
                .request(Method::POST, "vectors/upsert")
                .json(&json!({ "vectors": batch }))
                .send()
                .await?;
            self.ensure_success(response).await?;
            tracing::debug!(
                stage = "upserting",
                batch = batch_index + 1,
                batches = batch_count,
                vectors = batch.len(),
                "Upsert batch written"
            );
        }

        Ok(total)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<RetrievalMatch>, StoreError> {
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "filter": filter.to_value(),
            "includeMetadata": true,
        });

        let response = self
            .request(Method::POST, "query")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(filename = %filter.filename, error = %error, "Vector query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let matches = payload
            .matches
            .into_iter()
            .map(|item| RetrievalMatch {
                text: item.metadata.map(|meta| meta.text).unwrap_or_default(),
                score: item.score,
            })
            .collect();

        Ok(matches)
    }

    async fn delete(&self, filter: &DocumentFilter) -> Result<(), StoreError> {
        let response = self
            .request(Method::POST, "vectors/delete")
            .json(&json!({ "filter": filter.to_value() }))
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::info!(filename = %filter.filename, "Document vectors deleted");
        Ok(())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VectorMetadata;
    use httpmock::{Method::POST, MockServer};

    fn test_store(server: &MockServer) -> PineconeStore {
        PineconeStore {
            client: Client::builder()
                .user_agent("notewave-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "test-key".into(),
        }
    }

    fn record(id: &str, filename: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values: vec![0.1, 0.2],
            metadata: VectorMetadata {
                text: "chunk text".into(),
                filename: filename.into(),
                ingested_at: "2025-01-01T00:00:00Z".into(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_rebatches_large_inputs() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .header("Api-Key", "test-key");
                then.status(200).json_body(serde_json::json!({ "upsertedCount": 50 }));
            })
            .await;

        let store = test_store(&server);
        let records: Vec<VectorRecord> = (0..120)
            .map(|i| record(&format!("doc.pdf-{i}"), "doc.pdf"))
            .collect();

        let written = store.upsert(records).await.expect("upsert");

        assert_eq!(written, 120);
        // 120 vectors at a 50-vector ceiling means three sequential calls.
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn query_sends_filter_and_maps_matches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/query").json_body(serde_json::json!({
                    "vector": [0.1, 0.2],
                    "topK": 3,
                    "filter": { "filename": { "$eq": "doc.pdf" } },
                    "includeMetadata": true,
                }));
                then.status(200).json_body(serde_json::json!({
                    "matches": [
                        { "id": "doc.pdf-0", "score": 0.9, "metadata": { "text": "first", "filename": "doc.pdf" } },
                        { "id": "doc.pdf-3", "score": 0.4, "metadata": { "text": "second", "filename": "doc.pdf" } }
                    ]
                }));
            })
            .await;

        let store = test_store(&server);
        let filter = DocumentFilter::new("doc.pdf");
        let matches = store.query(&[0.1, 0.2], 3, &filter).await.expect("query");

        mock.assert();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].text, "first");
        assert!((matches[0].score - 0.9).abs() < f32::EPSILON);
        assert_eq!(matches[1].text, "second");
    }

    #[tokio::test]
    async fn query_tolerates_empty_match_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(200).json_body(serde_json::json!({ "matches": [] }));
            })
            .await;

        let store = test_store(&server);
        let matches = store
            .query(&[0.0, 0.0], 5, &DocumentFilter::new("missing.pdf"))
            .await
            .expect("query");
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn delete_targets_the_document_filter() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/delete")
                    .json_body(serde_json::json!({
                        "filter": { "filename": { "$eq": "doc.pdf" } }
                    }));
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let store = test_store(&server);
        store
            .delete(&DocumentFilter::new("doc.pdf"))
            .await
            .expect("delete");
        mock.assert();
    }

    #[tokio::test]
    async fn unexpected_status_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(500).body("index unavailable");
            })
            .await;

        let store = test_store(&server);
        let error = store
            .query(&[0.1], 5, &DocumentFilter::new("doc.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            StoreError::UnexpectedStatus { status, .. } if status.as_u16() == 500
        ));
    }
}
