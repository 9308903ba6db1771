//! Batched, rate-limit-aware embedding of chunk sets.
//!
//! Chunks are partitioned into fixed-size groups. Calls within a group run
//! concurrently; groups run strictly one after another with a pacing delay in
//! between to stay under provider rate limits. Results land in their original
//! positional slots, so the output order always matches the input order
//! regardless of completion order.

use super::{EmbeddingClient, EmbeddingError};
use crate::processing::types::Chunk;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// What to do when a chunk still fails after the client's internal retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole ingestion; no partially embedded document is kept.
    AbortAll,
    /// Drop the failed chunk and keep going with the rest.
    SkipFailed,
}

/// A chunk paired with the vector produced for it.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// The source chunk.
    pub chunk: Chunk,
    /// Embedding vector for the chunk's text.
    pub vector: Vec<f32>,
}

/// Fans chunk sets out to an [`EmbeddingClient`] with bounded concurrency.
pub struct BatchScheduler {
    client: Arc<dyn EmbeddingClient>,
    batch_size: usize,
    inter_batch_delay: Duration,
    policy: FailurePolicy,
}

impl BatchScheduler {
    /// Build a scheduler over the given client. A zero `batch_size` is
    /// treated as one.
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        batch_size: usize,
        inter_batch_delay: Duration,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            inter_batch_delay,
            policy,
        }
    }

    /// Embed every chunk, preserving input order in the result.
    ///
    /// Under [`FailurePolicy::AbortAll`] the first failed chunk aborts the
    /// call and all prior results are discarded. Under
    /// [`FailurePolicy::SkipFailed`] failed chunks are logged and dropped.
    pub async fn embed_all(
        &self,
        chunks: Vec<Chunk>,
    ) -> Result<Vec<EmbeddedChunk>, EmbeddingError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let total = chunks.len();
        let batch_count = total.div_ceil(self.batch_size);
        let mut embedded = Vec::with_capacity(total);
        let mut remaining = chunks;
        let mut batch_index = 0usize;

        while !remaining.is_empty() {
            if batch_index > 0 && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }

            let split = self.batch_size.min(remaining.len());
            let rest = remaining.split_off(split);
            let group = std::mem::replace(&mut remaining, rest);

            tracing::debug!(
                stage = "embedding",
                batch = batch_index + 1,
                batches = batch_count,
                size = group.len(),
                "Embedding batch"
            );

            let results = join_all(group.iter().map(|chunk| self.client.embed(&chunk.text))).await;

            for (chunk, result) in group.into_iter().zip(results) {
                match result {
                    Ok(vector) => embedded.push(EmbeddedChunk { chunk, vector }),
                    Err(error) => match self.policy {
                        FailurePolicy::AbortAll => {
                            tracing::error!(
                                stage = "embedding",
                                chunk = chunk.index,
                                outcome = "abort",
                                error = %error,
                                "Chunk failed; aborting ingestion"
                            );
                            return Err(error);
                        }
                        FailurePolicy::SkipFailed => {
                            tracing::warn!(
                                stage = "embedding",
                                chunk = chunk.index,
                                outcome = "skip",
                                error = %error,
                                "Chunk failed; skipping"
                            );
                        }
                    },
                }
            }

            batch_index += 1;
        }

        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            offset: 0,
            text: text.to_string(),
            source: "doc.txt".into(),
        }
    }

    /// Returns a vector encoding the chunk's numeric text, after a delay that
    /// is longer for earlier chunks so completion order inverts input order.
    struct InvertedDelayClient;

    #[async_trait]
    impl EmbeddingClient for InvertedDelayClient {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let value: f32 = text.parse().expect("numeric chunk text");
            let delay = Duration::from_millis((10.0 - value) as u64 * 5);
            tokio::time::sleep(delay).await;
            Ok(vec![value])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    /// Fails for a configured chunk text, succeeds otherwise.
    struct FailingClient {
        poison: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for FailingClient {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == self.poison {
                Err(EmbeddingError::Fatal(ProviderError::Malformed(
                    "poisoned".into(),
                )))
            } else {
                Ok(vec![1.0])
            }
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn preserves_input_order_despite_completion_order() {
        let scheduler = BatchScheduler::new(
            Arc::new(InvertedDelayClient),
            4,
            Duration::ZERO,
            FailurePolicy::AbortAll,
        );
        let chunks: Vec<Chunk> = (0..8).map(|i| chunk(i, &i.to_string())).collect();

        let embedded = scheduler.embed_all(chunks).await.expect("embedding");

        assert_eq!(embedded.len(), 8);
        for (expected, item) in embedded.iter().enumerate() {
            assert_eq!(item.chunk.index, expected);
            assert_eq!(item.vector, vec![expected as f32]);
        }
    }

    #[tokio::test]
    async fn abort_all_discards_prior_batches() {
        let client = Arc::new(FailingClient {
            poison: "4".into(),
            calls: AtomicUsize::new(0),
        });
        let scheduler = BatchScheduler::new(
            client.clone(),
            2,
            Duration::ZERO,
            FailurePolicy::AbortAll,
        );
        let chunks: Vec<Chunk> = (0..8).map(|i| chunk(i, &i.to_string())).collect();

        let result = scheduler.embed_all(chunks).await;

        assert!(result.is_err());
        // The failure lands in the third batch; the fourth never runs.
        assert_eq!(client.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn skip_failed_drops_only_the_poisoned_chunk() {
        let client = Arc::new(FailingClient {
            poison: "2".into(),
            calls: AtomicUsize::new(0),
        });
        let scheduler = BatchScheduler::new(
            client,
            2,
            Duration::ZERO,
            FailurePolicy::SkipFailed,
        );
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(i, &i.to_string())).collect();

        let embedded = scheduler.embed_all(chunks).await.expect("embedding");

        let indices: Vec<usize> = embedded.iter().map(|item| item.chunk.index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let scheduler = BatchScheduler::new(
            Arc::new(InvertedDelayClient),
            5,
            Duration::from_millis(200),
            FailurePolicy::AbortAll,
        );
        let embedded = scheduler.embed_all(Vec::new()).await.expect("embedding");
        assert!(embedded.is_empty());
    }
}
