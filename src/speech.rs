//! Text-to-speech and speech-to-text provider adapters.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

/// Voice id used for Host lines.
pub const HOST_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";
/// Voice id used for Expert lines.
pub const EXPERT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Which podcast voice to synthesize with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The host voice.
    Host,
    /// The expert voice.
    Expert,
}

impl Speaker {
    /// Map a script speaker label to a voice. Everything except the host
    /// label, including an empty one, reads in the expert voice.
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("host") {
            Self::Host
        } else {
            Self::Expert
        }
    }

    fn voice_id(self) -> &'static str {
        match self {
            Self::Host => HOST_VOICE_ID,
            Self::Expert => EXPERT_VOICE_ID,
        }
    }
}

/// Errors raised by the speech providers.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("unexpected speech provider response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Transcription response carried no transcript text.
    #[error("transcription response contained no transcript")]
    MissingTranscript,
}

/// Turns text into spoken audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize the text in the given speaker's voice, returning audio bytes.
    async fn synthesize(&self, text: &str, speaker: Speaker) -> Result<Bytes, SpeechError>;
}

/// Turns spoken audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio bytes to plain text.
    async fn transcribe(&self, audio: Bytes) -> Result<String, SpeechError>;
}

/// ElevenLabs-style text-to-speech client.
pub struct ElevenLabsClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl ElevenLabsClient {
    /// Construct a client for the given API host.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .user_agent("notewave/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, speaker: Speaker) -> Result<Bytes, SpeechError> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            speaker.voice_id()
        );

        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": "eleven_multilingual_v2",
                "voice_settings": { "stability": 0.5, "similarity_boost": 0.75 },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = SpeechError::UnexpectedStatus { status, body };
            tracing::error!(stage = "synthesizing", error = %error, "Speech synthesis failed");
            return Err(error);
        }

        let audio = response.bytes().await?;
        tracing::debug!(
            stage = "synthesizing",
            voice = speaker.voice_id(),
            bytes = audio.len(),
            "Audio synthesized"
        );
        Ok(audio)
    }
}

/// Deepgram-style speech-to-text client.
pub struct DeepgramClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl DeepgramClient {
    /// Construct a client for the given API host.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .user_agent("notewave/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Transcriber for DeepgramClient {
    async fn transcribe(&self, audio: Bytes) -> Result<String, SpeechError> {
        let url = format!(
            "{}/v1/listen?model=nova-2&smart_format=true",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = SpeechError::UnexpectedStatus { status, body };
            tracing::error!(stage = "transcribing", error = %error, "Transcription failed");
            return Err(error);
        }

        let payload: Value = response.json().await?;
        let transcript = payload["results"]["channels"][0]["alternatives"][0]["transcript"]
            .as_str()
            .map(str::to_string)
            .ok_or(SpeechError::MissingTranscript)?;

        Ok(transcript)
    }
}
