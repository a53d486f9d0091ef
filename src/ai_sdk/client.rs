use super::decoder::{StreamChunk, decode_stream};
use super::openai::{ChatMessage, ChatRequest, ChatResponse};
use crate::error::{AiError, Result};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, Response};

pub const DEFAULT_API_URL: &str = "https://api.zhizengzeng.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Every call is a single attempt; failures are returned to the caller as is.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: AiConfig,
}

impl ChatClient {
    pub fn new(config: AiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.send(messages, false).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        Ok(body.into_content())
    }

    /// Opens a streaming completion and returns the decoded chunks.
    ///
    /// Dropping the returned stream drops the underlying response, which
    /// aborts the upstream request.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream> {
        let response = self.send(messages, true).await?;
        if response.content_length() == Some(0) {
            return Err(AiError::NoReadableBody);
        }

        Ok(decode_stream(response.bytes_stream()).boxed())
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<Response> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            stream,
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            stream,
            "sending chat completion request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %detail, "AI API returned an error");
            return Err(AiError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                detail,
            });
        }

        Ok(response)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        )
    }
}
