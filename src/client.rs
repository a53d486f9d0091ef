use crate::protocol::{AskRequest, StreamEvent};
use anyhow::{Context, bail};
use futures::StreamExt;
use reqwest::Client as HttpClient;
use std::future::Future;

pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
}

/// Consumer of the server's streaming routes.
pub struct StreamClient {
    base_url: String,
    token: String,
    http: HttpClient,
}

impl StreamClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            base_url: normalize_base_url(&config.base_url),
            token: config.token,
            http: HttpClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Posts a question to `/api/ai/ask/stream` and hands every event to
    /// `on_event` as it arrives.
    pub async fn ask_stream<F, Fut>(&self, request: &AskRequest, mut on_event: F) -> anyhow::Result<()>
    where
        F: FnMut(StreamEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let response = self
            .http
            .post(format!("{}/api/ai/ask/stream", self.base_url))
            .bearer_auth(&self.token)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to open stream: {} - {}", status, body);
        }

        let mut stream = response.bytes_stream();
        let mut buffer = SseBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("stream interrupted")?;
            for event in buffer.push(&chunk) {
                on_event(event).await;
            }
        }

        Ok(())
    }
}

/// Splits a server-sent event stream into decoded [`StreamEvent`]s.
#[derive(Debug, Default)]
struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.pending
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();

        while let Some(idx) = find_event_end(&self.pending) {
            let raw: Vec<u8> = self.pending.drain(..idx + 2).collect();
            let raw = String::from_utf8_lossy(&raw);

            if let Some(data) = extract_sse_data(&raw) {
                if let Ok(event) = serde_json::from_str::<StreamEvent>(&data) {
                    events.push(event);
                }
            }
        }

        events
    }
}

fn find_event_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|pair| pair == b"\n\n")
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

fn extract_sse_data(raw: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.trim_start().to_string());
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
