use crate::prompts::DailyLog;
use crate::relay::RelayEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWeeklyReportRequest {
    pub daily_logs: Vec<DailyLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyReportResponse {
    pub content: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImproveDailyLogRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImproveDailyLogResponse {
    pub content: String,
}

/// Payload of one server-sent event on the streaming routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Content { content: String },
    Error { error: String },
}

impl From<RelayEvent> for StreamEvent {
    fn from(event: RelayEvent) -> Self {
        match event {
            RelayEvent::Fragment(content) => Self::Content { content },
            RelayEvent::Failed(error) => Self::Error { error },
        }
    }
}
