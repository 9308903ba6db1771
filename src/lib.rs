#![deny(missing_docs)]

//! Core library for the NoteWave document-study server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and batch scheduling.
pub mod embedding;
/// Document text extraction seam.
pub mod extract;
/// Feature prompts and structured generation outputs.
pub mod features;
/// Generation client abstraction and defensive JSON parsing.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document ingestion and retrieval pipeline.
pub mod processing;
/// Text-to-speech and transcription providers.
pub mod speech;
/// Vector store integration.
pub mod store;
