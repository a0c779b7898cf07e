//! OpenAI-compatible chat completion and speech provider

use crate::provider::{CompletionService, LlmError, LlmResult};
use crate::types::{ContentPart, Message, Role};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    image_detail: String,
    speech_model: String,
    voice: String,
    timeout: Option<Duration>,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_URL.to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 300,
            image_detail: "low".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "onyx".to_string(),
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, max_tokens: u32) -> Self {
        self.model = model.into();
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_image_detail(mut self, detail: impl Into<String>) -> Self {
        self.image_detail = detail.into();
        self
    }

    pub fn with_speech(mut self, model: impl Into<String>, voice: impl Into<String>) -> Self {
        self.speech_model = model.into();
        self.voice = voice.into();
        self
    }

    /// Per-request deadline, response body included. Overruns fail with `LlmError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key);
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => LlmError::Timeout(timeout),
            _ => LlmError::NetworkError(e),
        }
    }

    /// Build the chat completion body for `messages`, in order.
    pub fn chat_request(&self, messages: &[&Message]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(|m| self.wire_message(m)).collect(),
            max_tokens: self.max_tokens,
        }
    }

    fn wire_message(&self, message: &Message) -> WireMessage {
        // Text-only turns go out as a plain string; anything with an image needs parts.
        let content = if message.has_image() {
            let parts: Vec<serde_json::Value> = message
                .content
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    ContentPart::Image { media_type, data } => serde_json::json!({
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", media_type, data),
                            "detail": self.image_detail,
                        },
                    }),
                })
                .collect();
            serde_json::Value::Array(parts)
        } else {
            serde_json::Value::String(message.text())
        };
        WireMessage {
            role: message.role.as_str().to_string(),
            content,
        }
    }

    async fn post_chat(&self, body: &ChatRequest) -> LlmResult<String> {
        debug!("OpenAI request: model={} messages={}", body.model, body.messages.len());

        let response = self
            .post("chat/completions")
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                LlmError::InvalidResponse(e.to_string())
            }
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in completion".to_string()))
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete_multimodal(
        &self,
        history: &[Message],
        message: &Message,
    ) -> LlmResult<String> {
        let mut all: Vec<&Message> = history.iter().collect();
        all.push(message);
        let body = self.chat_request(&all);
        self.post_chat(&body).await
    }

    async fn complete_text(&self, prompt: &str) -> LlmResult<String> {
        let message = Message::new(Role::User, vec![ContentPart::text(prompt)]);
        let body = self.chat_request(&[&message]);
        self.post_chat(&body).await
    }

    async fn synthesize_speech(&self, text: &str) -> LlmResult<Bytes> {
        let body = SpeechRequest {
            model: self.speech_model.clone(),
            voice: self.voice.clone(),
            input: text.to_string(),
        };
        debug!("OpenAI speech request: model={} chars={}", body.model, text.len());

        let response = self
            .post("audio/speech")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = check_status(response).await?;
        response.bytes().await.map_err(|e| self.transport_error(e))
    }
}

async fn check_status(response: Response) -> LlmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    error!("OpenAI error {}: {}", status, error_text);

    match status.as_u16() {
        401 => Err(LlmError::AuthFailed(error_text)),
        429 => Err(LlmError::RateLimited { retry_after_ms: 60000 }),
        _ => Err(LlmError::RequestFailed(format!("{}: {}", status, error_text))),
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: serde_json::Value,
}

#[derive(Serialize)]
struct SpeechRequest {
    model: String,
    voice: String,
    input: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
