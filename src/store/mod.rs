//! Vector store integration.
//!
//! The store is the only shared mutable resource in the system. Every vector
//! is tagged with the filename it came from, and all queries and deletes are
//! scoped by that tag, so documents never read or write each other's vectors.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

pub mod pinecone;

pub use pinecone::PineconeStore;

/// Errors returned while interacting with the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Metadata persisted alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// The chunk text the vector was produced from.
    pub text: String,
    /// Filename of the owning document; the tenancy key for filters.
    pub filename: String,
    /// RFC3339 timestamp of the ingestion that wrote this vector.
    pub ingested_at: String,
}

/// A vector ready for upsert, with a stable identifier.
///
/// Ids are derived from `(filename, chunk index)` so re-ingesting the same
/// document overwrites its prior vectors instead of accumulating duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    /// Stable identifier, unique per document chunk.
    pub id: String,
    /// Embedding vector components.
    pub values: Vec<f32>,
    /// Filterable metadata.
    pub metadata: VectorMetadata,
}

/// A scored match returned from a similarity query. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalMatch {
    /// Stored chunk text.
    pub text: String,
    /// Provider-defined similarity score.
    pub score: f32,
}

/// Metadata predicate restricting a query or delete to one document's vectors.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    /// Filename the operation is scoped to.
    pub filename: String,
}

impl DocumentFilter {
    /// Build a filter for the given document.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// Render the filter in the store's wire format.
    pub fn to_value(&self) -> Value {
        json!({ "filename": { "$eq": self.filename } })
    }
}

/// Interface over an external similarity index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-replace vectors keyed by id. Returns the number of vectors
    /// written. Implementations re-batch internally to respect provider
    /// batch-size ceilings.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, StoreError>;

    /// Similarity query scoped to one document, returning at most `top_k`
    /// ranked matches. Ranking and tie-breaking are provider-defined.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<RetrievalMatch>, StoreError>;

    /// Remove every vector whose metadata matches the filter.
    async fn delete(&self, filter: &DocumentFilter) -> Result<(), StoreError>;
}
