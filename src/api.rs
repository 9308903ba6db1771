//! HTTP surface for NoteWave.
//!
//! This module exposes an Axum router over the document-study features:
//!
//! - `POST /ingest` – Multipart file upload; extract, chunk, embed, and index.
//! - `POST /delete` – Remove every vector belonging to a filename.
//! - `POST /chat` – Stream a grounded answer to a chat transcript.
//! - `POST /quiz`, `/flashcards`, `/podcast`, `/graph/extract`, `/debate`,
//!   `/vault/audit` – Structured study features generated from a
//!   document-wide context sample.
//! - `POST /speak` – Synthesize text to audio in a podcast voice.
//! - `POST /voice/transcribe` – Transcribe an uploaded audio clip.
//! - `GET /metrics` – Ingestion counters for observability.

use crate::features::{
    self, AuditReport, DebateTranscript, FlashcardsResponse, GraphData, PodcastScript,
    QuizResponse,
};
use crate::generation::{ChatMessage, GenerationClient, GenerationError, parse_lenient};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::processing::{
    IngestionPipeline, PipelineError, RetrievalError, RetrievalQuery, RetrievalService,
};
use crate::speech::{Speaker, SpeechError, SpeechSynthesizer, Transcriber};
use crate::store::{DocumentFilter, StoreError, VectorStore};
use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartError,
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Everything the handlers need, assembled once at startup.
pub struct AppState {
    /// Ingestion pipeline for uploaded documents.
    pub pipeline: IngestionPipeline,
    /// Context retrieval over the vector store.
    pub retrieval: RetrievalService,
    /// Vector store handle, used directly for deletes.
    pub store: Arc<dyn VectorStore>,
    /// Chat-completions backend.
    pub generation: Arc<dyn GenerationClient>,
    /// Text-to-speech backend.
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Speech-to-text backend.
    pub transcriber: Arc<dyn Transcriber>,
    /// Ingestion counters.
    pub metrics: Arc<IngestMetrics>,
    /// Hard ceiling on uploaded file size, in bytes.
    pub max_upload_bytes: usize,
}

/// Build the HTTP router exposing the study API surface.
pub fn create_router(state: Arc<AppState>) -> Router {
    // The multipart limit leaves slack above the file ceiling so our own 413
    // fires with a useful message before axum's body limit does.
    let body_limit = state.max_upload_bytes + 1024 * 1024;
    Router::new()
        .route("/ingest", post(ingest_document))
        .route("/delete", post(delete_document))
        .route("/chat", post(chat))
        .route("/quiz", post(generate_quiz))
        .route("/flashcards", post(generate_flashcards))
        .route("/podcast", post(generate_podcast))
        .route("/graph/extract", post(extract_graph))
        .route("/debate", post(generate_debate))
        .route("/vault/audit", post(audit_document))
        .route("/speak", post(speak))
        .route("/voice/transcribe", post(transcribe_voice))
        .route("/metrics", get(get_metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Map a multipart read failure to the right status: bodies that blow the
/// size limit keep the 413 contract, everything else is a malformed request.
fn multipart_error(error: MultipartError, limit: usize) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        AppError::Validation(error.to_string())
    }
}

/// Success response for `POST /ingest`.
#[derive(Serialize)]
struct IngestResponse {
    success: bool,
    /// Number of vectors written for the document.
    uploaded: usize,
    filename: String,
}

/// Ingest one uploaded document.
async fn ingest_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, state.max_upload_bytes))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "document.txt".to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|err| multipart_error(err, state.max_upload_bytes))?;
            upload = Some((filename, bytes));
            break;
        }
    }

    let Some((filename, bytes)) = upload else {
        return Err(AppError::Validation("No file uploaded".to_string()));
    };
    if bytes.len() > state.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(state.max_upload_bytes));
    }

    let outcome = state.pipeline.ingest(&filename, &bytes).await?;
    tracing::info!(
        filename = outcome.filename,
        chunks = outcome.chunk_count,
        vectors = outcome.vectors_upserted,
        "Ingest request completed"
    );

    Ok(Json(IngestResponse {
        success: true,
        uploaded: outcome.vectors_upserted,
        filename: outcome.filename,
    }))
}

/// Request body for `POST /delete`.
#[derive(Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    filename: String,
}

/// Delete every vector belonging to one document.
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.filename.trim().is_empty() {
        return Err(AppError::Validation("Filename required".to_string()));
    }

    state
        .store
        .delete(&DocumentFilter::new(&request.filename))
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// Request body for `POST /chat`. The client addresses documents by the
/// `fileId` it got back from ingestion, which is the filename.
#[derive(Deserialize)]
struct ChatRequest {
    #[serde(rename = "fileId")]
    filename: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

/// Stream a grounded answer for the latest user question.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let question = request
        .messages
        .iter()
        .rev()
        .find(|message| message.role == "user")
        .map(|message| message.content.clone())
        .ok_or_else(|| AppError::Validation("No user message provided".to_string()))?;

    let retrieved = state
        .retrieval
        .retrieve(
            &request.filename,
            &RetrievalQuery::Question(question),
            features::CHAT_TOP_K,
            features::CHAT_CONTEXT_CHARS,
        )
        .await?;

    let system = features::chat_system_prompt(&retrieved.context);
    let stream = state
        .generation
        .stream_chat(&system, request.messages)
        .await?;
    let body = Body::from_stream(stream.map(|token| token.map(Bytes::from)));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Request body shared by the document-wide study features.
#[derive(Deserialize)]
struct FeatureRequest {
    #[serde(rename = "fileId")]
    filename: String,
}

/// Request body for `POST /quiz`.
#[derive(Deserialize)]
struct QuizRequest {
    #[serde(rename = "fileId")]
    filename: String,
    #[serde(default = "default_quiz_count")]
    count: usize,
}

fn default_quiz_count() -> usize {
    5
}

/// Assemble a document-wide context for a study feature.
async fn gist_context(
    state: &AppState,
    filename: &str,
    top_k: usize,
    char_budget: usize,
) -> Result<String, AppError> {
    let retrieved = state
        .retrieval
        .retrieve(filename, &RetrievalQuery::Gist, top_k, char_budget)
        .await?;
    Ok(retrieved.context)
}

/// Generate a multiple-choice quiz from the document.
async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuizRequest>,
) -> Result<Json<QuizResponse>, AppError> {
    let context = gist_context(
        &state,
        &request.filename,
        features::QUIZ_TOP_K,
        features::QUIZ_CONTEXT_CHARS,
    )
    .await?;

    let raw = state
        .generation
        .complete_json(&features::quiz_system_prompt(request.count), &context)
        .await?;
    Ok(Json(parse_lenient(&raw)))
}

/// Generate study flashcards from the document.
async fn generate_flashcards(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<FlashcardsResponse>, AppError> {
    let context = gist_context(
        &state,
        &request.filename,
        features::FLASHCARDS_TOP_K,
        features::FLASHCARDS_CONTEXT_CHARS,
    )
    .await?;

    let raw = state
        .generation
        .complete_json(&features::flashcards_system_prompt(), &context)
        .await?;
    Ok(Json(parse_lenient(&raw)))
}

/// Generate a two-voice podcast script from the document.
async fn generate_podcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<PodcastScript>, AppError> {
    let context = gist_context(
        &state,
        &request.filename,
        features::PODCAST_TOP_K,
        features::PODCAST_CONTEXT_CHARS,
    )
    .await?;
    if context.trim().len() < 10 {
        return Err(AppError::NotFound(
            "No document content found. Ensure the file was ingested correctly.".to_string(),
        ));
    }

    let raw = state
        .generation
        .complete_json(&features::podcast_system_prompt(), &context)
        .await?;
    Ok(Json(PodcastScript::parse(&raw)))
}

/// Extract a concept knowledge graph from the document.
async fn extract_graph(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<GraphData>, AppError> {
    let context = gist_context(
        &state,
        &request.filename,
        features::GRAPH_TOP_K,
        features::GRAPH_CONTEXT_CHARS,
    )
    .await?;
    // Nothing to extract from a blank document; an empty graph beats a
    // hallucinated one.
    if context.trim().len() < 10 {
        return Ok(Json(GraphData::default()));
    }

    let raw = state
        .generation
        .complete_json(&features::graph_system_prompt(), &context)
        .await?;
    Ok(Json(parse_lenient(&raw)))
}

/// Generate a three-agent debate transcript about the document.
async fn generate_debate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<DebateTranscript>, AppError> {
    let context = gist_context(
        &state,
        &request.filename,
        features::DEBATE_TOP_K,
        features::DEBATE_CONTEXT_CHARS,
    )
    .await?;

    let raw = state
        .generation
        .complete_json(&features::debate_system_prompt(), &context)
        .await?;
    Ok(Json(parse_lenient(&raw)))
}

/// Audit the document's reliability and bias.
async fn audit_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<AuditReport>, AppError> {
    let context = gist_context(
        &state,
        &request.filename,
        features::AUDIT_TOP_K,
        features::AUDIT_CONTEXT_CHARS,
    )
    .await?;

    let raw = state
        .generation
        .complete_json(&features::audit_system_prompt(), &context)
        .await?;
    Ok(Json(parse_lenient(&raw)))
}

/// Request body for `POST /speak`.
#[derive(Deserialize)]
struct SpeakRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    speaker: Option<String>,
}

/// Synthesize text to audio in a podcast voice.
async fn speak(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<Response, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("No text provided".to_string()));
    }

    // Only an explicit host label selects the host voice; absent or unknown
    // labels read in the expert voice.
    let speaker = Speaker::from_label(request.speaker.as_deref().unwrap_or_default());
    let audio = state.synthesizer.synthesize(&request.text, speaker).await?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// Response body for `POST /voice/transcribe`.
#[derive(Serialize)]
struct TranscribeResponse {
    transcript: String,
}

/// Transcribe an uploaded audio clip.
async fn transcribe_voice(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, AppError> {
    let mut audio: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, state.max_upload_bytes))?
    {
        if field.name() == Some("audio") {
            audio = Some(
                field
                    .bytes()
                    .await
                    .map_err(|err| multipart_error(err, state.max_upload_bytes))?,
            );
            break;
        }
    }

    let Some(audio) = audio else {
        return Err(AppError::Validation("No audio uploaded".to_string()));
    };

    let transcript = state.transcriber.transcribe(audio).await?;
    Ok(Json(TranscribeResponse { transcript }))
}

/// Return the ingestion counters.
async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Handler-level error, mapped to an HTTP status and a JSON error body.
enum AppError {
    /// Request was malformed or missing required parts.
    Validation(String),
    /// Uploaded payload exceeded the configured ceiling.
    PayloadTooLarge(usize),
    /// The requested document has no usable content.
    NotFound(String),
    /// A downstream dependency failed.
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("File exceeds the {limit}-byte upload limit"),
            ),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(error: PipelineError) -> Self {
        tracing::error!(stage = %error.stage(), error = %error, "Ingestion failed");
        Self::Internal(error.to_string())
    }
}

impl From<RetrievalError> for AppError {
    fn from(error: RetrievalError) -> Self {
        tracing::error!(error = %error, "Retrieval failed");
        Self::Internal(error.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        tracing::error!(error = %error, "Vector store operation failed");
        Self::Internal(error.to_string())
    }
}

impl From<GenerationError> for AppError {
    fn from(error: GenerationError) -> Self {
        tracing::error!(error = %error, "Generation failed");
        Self::Internal(error.to_string())
    }
}

impl From<SpeechError> for AppError {
    fn from(error: SpeechError) -> Self {
        tracing::error!(error = %error, "Speech provider failed");
        Self::Internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let response = AppError::Validation("No file uploaded".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn oversize_uploads_map_to_payload_too_large() {
        let response = AppError::PayloadTooLarge(4_718_592).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn missing_content_maps_to_not_found() {
        let response = AppError::NotFound("No document content found.".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
