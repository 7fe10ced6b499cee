use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::ai_service::{CompletionRequest, InferenceService};
use crate::config::Config;
use crate::error::ProviderError;

/// Upper bound on accumulated streamed text.
pub const MAX_STREAM_BYTES: usize = 256 * 1024;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageData },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageText,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamFailure>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamFailure {
    message: String,
}

/// Client for Groq's OpenAI-compatible chat completions API.
pub struct GroqService {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GroqService {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.request_timeout,
        )
    }

    fn build_body<'a>(request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: MessageContent::Text(request.system_prompt.clone()),
            });
        }

        let user_content = match &request.image_data_url {
            Some(url) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: request.user_prompt.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageData {
                        url: url.clone(),
                        detail: "low",
                    },
                },
            ]),
            None => MessageContent::Text(request.user_prompt.clone()),
        };
        messages.push(ChatMessage {
            role: "user",
            content: user_content,
        });

        ChatRequest {
            model: &request.model,
            messages,
            temperature: request.sampling.temperature,
            max_tokens: request.sampling.max_tokens,
            top_p: request.sampling.top_p,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        log::info!("🤖 Sending request to {} with model: {} (stream: {})", self.base_url, body.model, body.stream);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                log::error!("❌ Inference request failed: {}", e);
                ProviderError::from(e)
            })?;

        let status = response.status();
        log::debug!("📥 Inference response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Inference API error ({}): {}", status, error_text);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: error_text,
            });
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl InferenceService for GroqService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = Self::build_body(request, false);
        let response = self.send(&body).await?;

        let response_text = response.text().await?;
        log::debug!("📄 Raw inference response size: {} bytes", response_text.len());

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn complete_streamed(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = Self::build_body(request, true);
        let response = self.send(&body).await?;

        let mut stream = response.bytes_stream();
        let mut accumulator = SseAccumulator::new(MAX_STREAM_BYTES);
        while let Some(chunk) = stream.next().await {
            if accumulator.feed(&chunk?)? {
                break;
            }
        }

        let text = accumulator.finish()?;
        log::debug!("📄 Streamed response assembled: {} bytes", text.len());
        Ok(text)
    }
}

/// Collects `data:` events of a server-sent chat completion stream into
/// one string. Lines may be split arbitrarily across network chunks.
pub struct SseAccumulator {
    pending: Vec<u8>,
    text: String,
    limit: usize,
    done: bool,
}

impl SseAccumulator {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            text: String::new(),
            limit,
            done: false,
        }
    }

    /// Feed raw bytes. Returns `true` once the `[DONE]` sentinel was seen.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<bool, ProviderError> {
        self.pending.extend_from_slice(chunk);

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.handle_line(&line)?;
            if self.done {
                return Ok(true);
            }
        }

        if self.pending.len() > self.limit {
            return Err(ProviderError::StreamTooLarge(self.limit));
        }

        Ok(false)
    }

    /// Flush a trailing unterminated line and return the assembled text.
    pub fn finish(mut self) -> Result<String, ProviderError> {
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.handle_line(&rest)?;
        }
        Ok(self.text)
    }

    fn handle_line(&mut self, raw: &[u8]) -> Result<(), ProviderError> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| ProviderError::Malformed(format!("stream is not UTF-8: {}", e)))?
            .trim();

        // Blank separators, comments and event names carry no text.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| ProviderError::Malformed(format!("bad stream event: {}", e)))?;

        if let Some(failure) = chunk.error {
            return Err(ProviderError::Http(failure.message));
        }

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                self.text.push_str(&content);
            }
        }

        if self.text.len() > self.limit {
            return Err(ProviderError::StreamTooLarge(self.limit));
        }

        Ok(())
    }
}
