//! Document processing: chunking, ingestion orchestration, and retrieval.

pub mod chunking;
pub mod retrieval;
pub mod service;
pub mod types;

pub use chunking::chunk_text;
pub use retrieval::{PROBE_COMPONENT, RetrievalQuery, RetrievalService};
pub use service::IngestionPipeline;
pub use types::{
    Chunk, ChunkingError, IngestOutcome, IngestStage, PipelineError, RetrievalError,
    RetrievedContext,
};
