//! Ingestion orchestration: extract, chunk, embed, upsert.

use crate::embedding::BatchScheduler;
use crate::extract::TextExtractor;
use crate::metrics::IngestMetrics;
use crate::processing::chunking::chunk_text;
use crate::processing::types::{IngestOutcome, PipelineError};
use crate::store::{VectorMetadata, VectorRecord, VectorStore};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Runs a document through the full ingestion pipeline.
///
/// Each stage's failure aborts the request; nothing is written unless
/// embedding completed for the chunks being upserted. Vector ids are derived
/// from `(filename, chunk index)`, so re-ingesting a document overwrites its
/// prior vectors in place.
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    scheduler: BatchScheduler,
    store: Arc<dyn VectorStore>,
    metrics: Arc<IngestMetrics>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestionPipeline {
    /// Assemble a pipeline from its stage implementations.
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        scheduler: BatchScheduler,
        store: Arc<dyn VectorStore>,
        metrics: Arc<IngestMetrics>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            extractor,
            scheduler,
            store,
            metrics,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Ingest one uploaded document under the given filename.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, PipelineError> {
        tracing::info!(
            stage = "extracting",
            filename,
            size = bytes.len(),
            "Ingestion started"
        );
        let text = self.extractor.extract(bytes, filename).await?;

        let chunks = chunk_text(&text, self.chunk_size, self.chunk_overlap, filename)?;
        let chunk_count = chunks.len();
        tracing::info!(stage = "chunking", filename, chunks = chunk_count, "Text chunked");

        let embedded = self.scheduler.embed_all(chunks).await?;

        let ingested_at = current_timestamp_rfc3339();
        let records: Vec<VectorRecord> = embedded
            .into_iter()
            // Whitespace-only chunks embed to empty vectors; there is nothing
            // to index for them.
            .filter(|item| !item.vector.is_empty())
            .map(|item| VectorRecord {
                id: format!("{filename}-{}", item.chunk.index),
                values: item.vector,
                metadata: VectorMetadata {
                    text: item.chunk.text,
                    filename: filename.to_string(),
                    ingested_at: ingested_at.clone(),
                },
            })
            .collect();

        let vectors_upserted = self.store.upsert(records).await?;
        self.metrics.record_document(chunk_count as u64, vectors_upserted as u64);

        tracing::info!(
            stage = "upserting",
            filename,
            chunks = chunk_count,
            vectors = vectors_upserted,
            outcome = "success",
            "Ingestion complete"
        );

        Ok(IngestOutcome {
            chunk_count,
            vectors_upserted,
            filename: filename.to_string(),
        })
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingError, FailurePolicy};
    use crate::extract::PlainTextExtractor;
    use crate::store::{DocumentFilter, RetrievalMatch, StoreError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedVectorClient;

    #[async_trait]
    impl EmbeddingClient for FixedVectorClient {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![0.5, 0.5])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        upserted: Mutex<Vec<VectorRecord>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, StoreError> {
            let count = records.len();
            self.upserted.lock().unwrap().extend(records);
            Ok(count)
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _filter: &DocumentFilter,
        ) -> Result<Vec<RetrievalMatch>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _filter: &DocumentFilter) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn pipeline(store: Arc<RecordingStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(PlainTextExtractor),
            BatchScheduler::new(
                Arc::new(FixedVectorClient),
                5,
                Duration::ZERO,
                FailurePolicy::AbortAll,
            ),
            store,
            Arc::new(IngestMetrics::default()),
            50,
            10,
        )
    }

    #[tokio::test]
    async fn ingest_writes_deterministic_vector_ids() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(store.clone());
        let text = "alpha ".repeat(30);

        let outcome = pipeline
            .ingest("notes.txt", text.as_bytes())
            .await
            .expect("ingestion");

        assert!(outcome.chunk_count > 1);
        assert_eq!(outcome.vectors_upserted, outcome.chunk_count);
        assert_eq!(outcome.filename, "notes.txt");

        let records = store.upserted.lock().unwrap();
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.id, format!("notes.txt-{index}"));
            assert_eq!(record.metadata.filename, "notes.txt");
            assert!(!record.metadata.ingested_at.is_empty());
        }
    }

    #[tokio::test]
    async fn reingesting_reuses_the_same_ids() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(store.clone());
        let text = "beta ".repeat(40);

        pipeline
            .ingest("doc.txt", text.as_bytes())
            .await
            .expect("first ingestion");
        let first: Vec<String> = store
            .upserted
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.id.clone())
            .collect();
        store.upserted.lock().unwrap().clear();

        pipeline
            .ingest("doc.txt", text.as_bytes())
            .await
            .expect("second ingestion");
        let second: Vec<String> = store
            .upserted
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.id.clone())
            .collect();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn extraction_failure_reaches_the_caller_with_its_stage() {
        use crate::processing::types::IngestStage;

        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(store.clone());

        let error = pipeline
            .ingest("scan.pdf", &[0xff, 0xfe])
            .await
            .unwrap_err();

        assert_eq!(error.stage(), IngestStage::Extracting);
        assert!(store.upserted.lock().unwrap().is_empty());
    }
}
