//! Chat-completions client for OpenAI-compatible generation endpoints.
//!
//! Two call shapes: a buffered JSON-mode completion for structured feature
//! payloads, and a token stream parsed from server-sent events for chat.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors raised by the generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("unexpected generation response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The event stream broke or carried an undecodable frame.
    #[error("generation stream failed: {0}")]
    Stream(String),
}

/// One message in a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author role: `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Interface over a chat-completions backend.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run a single completion in JSON mode and return the raw content string.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, GenerationError>;

    /// Stream completion tokens for a chat transcript.
    async fn stream_chat(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<BoxStream<'static, Result<String, GenerationError>>, GenerationError>;
}

/// HTTP client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompatClient {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

impl OpenAiCompatClient {
    /// Construct a client for the given endpoint and model.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .user_agent("notewave/0.1")
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn send(&self, body: Value) -> Result<reqwest::Response, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::UnexpectedStatus { status, body };
            tracing::error!(stage = "generating", error = %error, "Generation request failed");
            return Err(error);
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for OpenAiCompatClient {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.1,
            "response_format": { "type": "json_object" },
        });

        let response = self.send(body).await?;
        let payload: Value = response.json().await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }

    async fn stream_chat(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<BoxStream<'static, Result<String, GenerationError>>, GenerationError> {
        let mut wire_messages = vec![json!({ "role": "system", "content": system })];
        wire_messages.extend(messages.iter().map(|message| {
            json!({ "role": message.role, "content": message.content })
        }));

        let body = json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": 0.1,
            "max_tokens": 1500,
            "stream": true,
        });

        let response = self.send(body).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut buffer = String::new();
            'read: while let Some(frame) = bytes.next().await {
                let frame = frame.map_err(|err| GenerationError::Stream(err.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&frame));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'read;
                    }

                    let event: Value = serde_json::from_str(data)
                        .map_err(|err| GenerationError::Stream(err.to_string()))?;
                    if let Some(token) = event["choices"][0]["delta"]["content"].as_str() {
                        if !token.is_empty() {
                            yield token.to_string();
                        }
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Deserialize model output that may be wrapped in Markdown code fences.
///
/// Models in JSON mode occasionally still emit ```json fences or stray prose.
/// Anything that fails to parse after fence-stripping falls back to the
/// type's default so one malformed response degrades the feature instead of
/// failing the request.
pub fn parse_lenient<T: DeserializeOwned + Default>(raw: &str) -> T {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str(cleaned) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!(
                stage = "generating",
                error = %error,
                "Model output was not valid JSON; using defaults"
            );
            T::default()
        }
    }
}
