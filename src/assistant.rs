use crate::ai_sdk::{AiConfig, ChatClient, ChatMessage};
use crate::error::Result;
use crate::prompts::{self, DailyLog};
use crate::relay::{self, RelayReceiver};

/// The AI operations offered to report authors.
///
/// Each operation has a one-shot form returning the whole answer and, where
/// the front end streams, a relayed form. Both send the same conversation.
pub struct Assistant {
    client: ChatClient,
}

impl Assistant {
    pub fn new(config: AiConfig) -> Self {
        Self {
            client: ChatClient::new(config),
        }
    }

    pub fn config(&self) -> &AiConfig {
        self.client.config()
    }

    pub async fn ask(&self, question: &str, system_prompt: Option<&str>) -> Result<String> {
        self.client
            .chat(&prompts::ask_messages(question, system_prompt))
            .await
    }

    pub fn ask_stream(&self, question: &str, system_prompt: Option<&str>) -> RelayReceiver {
        self.relay(prompts::ask_messages(question, system_prompt))
    }

    pub async fn generate_weekly_report(
        &self,
        logs: &[DailyLog],
        template: Option<&str>,
    ) -> Result<String> {
        self.client
            .chat(&prompts::weekly_report_messages(logs, template))
            .await
    }

    pub fn generate_weekly_report_stream(
        &self,
        logs: &[DailyLog],
        template: Option<&str>,
    ) -> RelayReceiver {
        self.relay(prompts::weekly_report_messages(logs, template))
    }

    pub async fn improve_daily_log(&self, content: &str) -> Result<String> {
        self.client
            .chat(&prompts::improve_daily_log_messages(content))
            .await
    }

    fn relay(&self, messages: Vec<ChatMessage>) -> RelayReceiver {
        let client = self.client.clone();
        relay::spawn_session(async move { client.chat_stream(&messages).await })
    }
}
