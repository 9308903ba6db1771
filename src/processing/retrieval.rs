//! Query-scoped context assembly over the vector store.

use crate::embedding::EmbeddingClient;
use crate::processing::types::{RetrievalError, RetrievedContext};
use crate::store::{DocumentFilter, VectorStore};
use std::sync::Arc;

/// Component value of the gist probe vector.
///
/// Document-wide features do not have a question to embed; a constant
/// low-magnitude probe retrieves a representative sample of a document's
/// vectors instead of the neighborhood of any particular query.
pub const PROBE_COMPONENT: f32 = 0.01;

/// How the query vector for a retrieval is produced.
#[derive(Debug, Clone)]
pub enum RetrievalQuery {
    /// Embed a user question and retrieve its nearest chunks.
    Question(String),
    /// Use the constant probe vector for a document-wide sample.
    Gist,
}

/// Retrieves and assembles a bounded context string for one document.
pub struct RetrievalService {
    embedding: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalService {
    /// Build a service over an embedding client and vector store.
    pub fn new(embedding: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedding, store }
    }

    /// Retrieve up to `top_k` matches for the query, scoped to `filename`,
    /// and join their texts into a context string truncated to `char_budget`
    /// characters.
    pub async fn retrieve(
        &self,
        filename: &str,
        query: &RetrievalQuery,
        top_k: usize,
        char_budget: usize,
    ) -> Result<RetrievedContext, RetrievalError> {
        let vector = match query {
            RetrievalQuery::Question(question) => {
                let vector = self.embedding.embed(question).await?;
                if vector.is_empty() {
                    tracing::debug!(filename, "Blank question; skipping retrieval");
                    return Ok(RetrievedContext::default());
                }
                vector
            }
            RetrievalQuery::Gist => vec![PROBE_COMPONENT; self.embedding.dimension()],
        };

        let filter = DocumentFilter::new(filename);
        let matches = self.store.query(&vector, top_k, &filter).await?;
        let match_count = matches.len();

        let joined = matches
            .into_iter()
            .map(|item| item.text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let context = truncate_chars(joined, char_budget);

        tracing::debug!(
            stage = "retrieving",
            filename,
            matches = match_count,
            context_chars = context.chars().count(),
            "Context assembled"
        );

        Ok(RetrievedContext {
            context,
            match_count,
        })
    }
}

/// Cut a string to at most `budget` characters, on a character boundary.
fn truncate_chars(mut text: String, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((byte_offset, _)) => {
            text.truncate(byte_offset);
            text
        }
        None => text,
    }
}
