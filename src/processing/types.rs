//! Core data types and error definitions for the processing pipeline.

use crate::{embedding::EmbeddingError, extract::ExtractionError, store::StoreError};
use thiserror::Error;

/// A bounded, possibly overlapping span of a document's text — the unit of embedding.
///
/// Chunks are produced in increasing `index` order; their spans, taken together,
/// cover the whole source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of the chunk within its document.
    pub index: usize,
    /// Character offset of the chunk's first character in the source text.
    pub offset: usize,
    /// Chunk text content.
    pub text: String,
    /// Filename of the document the chunk was cut from.
    pub source: String,
}

/// Errors produced while splitting raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunking was configured with a zero-character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Pipeline stages an ingestion request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Turning raw file bytes into plain text.
    Extracting,
    /// Splitting text into bounded spans.
    Chunking,
    /// Producing vectors for each chunk.
    Embedding,
    /// Writing vectors to the store.
    Upserting,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Extracting => "extracting",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Upserting => "upserting",
        };
        f.write_str(label)
    }
}

/// Stage-tagged errors emitted by the ingestion pipeline.
///
/// A failure in any stage fails the whole request; only the embedding client
/// retries internally.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Text could not be extracted from the uploaded bytes.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// Chunking rejected the configured parameters.
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector store rejected the upsert.
    #[error("vector upsert failed: {0}")]
    Upserting(#[from] StoreError),
}

impl PipelineError {
    /// The stage at which this ingestion failed.
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::Extraction(_) => IngestStage::Extracting,
            Self::Chunking(_) => IngestStage::Chunking,
            Self::Embedding(_) => IngestStage::Embedding,
            Self::Upserting(_) => IngestStage::Upserting,
        }
    }
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Number of chunks produced for the document.
    pub chunk_count: usize,
    /// Number of vectors written to the store.
    pub vectors_upserted: usize,
    /// Filename the vectors were tagged with.
    pub filename: String,
}

/// Errors emitted while assembling a retrieval context.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query text could not be embedded.
    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),
    /// The vector store query failed.
    #[error("vector store query failed: {0}")]
    Store(#[from] StoreError),
}

/// Bounded context string assembled from retrieval matches.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    /// Concatenated match texts, truncated to the character budget.
    pub context: String,
    /// Number of matches the context was assembled from.
    pub match_count: usize,
}
