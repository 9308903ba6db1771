use std::env;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the NoteWave server.
///
/// Loaded once in `main` and handed to component constructors explicitly so
/// that every provider client can be replaced with a test double.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the vector index that stores document embeddings.
    pub vector_index_url: String,
    /// API key required by the vector index.
    pub vector_index_api_key: String,
    /// Feature-extraction endpoint that turns text into vectors.
    pub embedding_url: String,
    /// API key for the embedding provider.
    pub embedding_api_key: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Chat-completions endpoint used for answer/quiz/script generation.
    pub generation_url: String,
    /// API key for the generation provider.
    pub generation_api_key: String,
    /// Model identifier passed to the generation provider.
    pub generation_model: String,
    /// Base URL of the text-to-speech provider.
    pub tts_url: String,
    /// API key for the text-to-speech provider.
    pub tts_api_key: String,
    /// Base URL of the transcription provider.
    pub transcribe_url: String,
    /// API key for the transcription provider.
    pub transcribe_api_key: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters of overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks embedded concurrently per batch.
    pub embed_batch_size: usize,
    /// Pacing delay between embedding batches, in milliseconds.
    pub embed_batch_delay_ms: u64,
    /// Hard ceiling on uploaded file size, in bytes.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Optional log file path; defaults to `logs/notewave.log` when unset.
    pub log_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            vector_index_url: load_env("VECTOR_INDEX_URL")?,
            vector_index_api_key: load_env("VECTOR_INDEX_API_KEY")?,
            embedding_url: load_env("EMBEDDING_URL")?,
            embedding_api_key: load_env("EMBEDDING_API_KEY")?,
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", load_env("EMBEDDING_DIMENSION")?)?,
            generation_url: load_env("GENERATION_URL")?,
            generation_api_key: load_env("GENERATION_API_KEY")?,
            generation_model: load_env("GENERATION_MODEL")?,
            tts_url: load_env("TTS_URL")?,
            tts_api_key: load_env("TTS_API_KEY")?,
            transcribe_url: load_env("TRANSCRIBE_URL")?,
            transcribe_api_key: load_env("TRANSCRIBE_API_KEY")?,
            chunk_size: parse_env_or("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", 200)?,
            embed_batch_size: parse_env_or("EMBED_BATCH_SIZE", 5)?,
            embed_batch_delay_ms: parse_env_or("EMBED_BATCH_DELAY_MS", 200)?,
            max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", 4_718_592)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| parse_env("SERVER_PORT", value))
                .transpose()?,
            log_file: load_env_optional("NOTEWAVE_LOG_FILE"),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => parse_env(key, value),
        None => Ok(default),
    }
}
