//! Text extraction seam for uploaded files.
//!
//! Real PDF/OCR extraction lives behind an external provider; the pipeline
//! only needs "bytes in, plain text out". [`PlainTextExtractor`] covers
//! plain-text uploads and test fixtures.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while turning file bytes into plain text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No usable text was produced for the file.
    #[error("could not extract text; the file may be an image scan or encrypted")]
    NoText,
    /// Bytes were not text in a supported encoding.
    #[error("unsupported file encoding: {0}")]
    InvalidEncoding(String),
}

/// Turns raw file bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from the uploaded bytes.
    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractionError>;
}

/// Extractor for files that already are plain text.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractionError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| ExtractionError::InvalidEncoding(err.to_string()))?;
        if text.trim().is_empty() {
            tracing::warn!(filename, "Extraction produced no text");
            return Err(ExtractionError::NoText);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_utf8_text() {
        let text = PlainTextExtractor
            .extract("hello world".as_bytes(), "notes.txt")
            .await
            .expect("extraction");
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn whitespace_only_input_is_rejected() {
        let error = PlainTextExtractor
            .extract(b"  \n\t ", "blank.txt")
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::NoText));
    }

    #[tokio::test]
    async fn binary_input_is_rejected() {
        let error = PlainTextExtractor
            .extract(&[0xff, 0xfe, 0x00, 0x80], "scan.pdf")
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::InvalidEncoding(_)));
    }
}
