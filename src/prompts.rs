use crate::ai_sdk::ChatMessage;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ASSISTANT_PROMPT: &str = "\
You are a professional workplace assistant. You help users write daily reports \
and weekly reports and answer work-related questions.
Reply in Markdown:
- use # ## ### for headings
- use - or 1. 2. 3. for lists
- use `code` or ``` for code
- use **text** for bold
- use *text* for italics

Keep replies concise, professional and well organized.";

const WEEKLY_REPORT_PROMPT: &str = "\
You are a professional weekly report writer. Using the daily reports the user \
provides for this week, write a clearly structured and complete weekly report.";

const WEEKLY_REPORT_SECTIONS: &str = "\
The weekly report should contain these sections:
## Summary of the week
## Main work completed
## Problems encountered and solutions
## Plan for next week";

const MARKDOWN_OUTPUT: &str = "Write the output in Markdown, keeping it professional and concise.";

const IMPROVE_DAILY_LOG_PROMPT: &str = "\
You are a professional daily report editor. Help the user polish their daily \
report so it reads clearly and professionally.
Keep all of the original information, but you may:
1. improve the wording
2. add suitable structure
3. highlight the key points

Write the output in Markdown.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: String,
    pub content: String,
}

/// Conversation for a free-form question. The default assistant prompt is
/// used whenever no system prompt is given, on both delivery paths.
pub fn ask_messages(question: &str, system_prompt: Option<&str>) -> Vec<ChatMessage> {
    let system_prompt = system_prompt
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(DEFAULT_ASSISTANT_PROMPT);

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(question),
    ]
}

/// Conversation that turns a week of daily logs into a weekly report,
/// optionally following a report template.
pub fn weekly_report_messages(logs: &[DailyLog], template: Option<&str>) -> Vec<ChatMessage> {
    let mut system_prompt = WEEKLY_REPORT_PROMPT.to_string();
    match template.map(str::trim).filter(|template| !template.is_empty()) {
        Some(template) => {
            system_prompt.push_str("\n\nFollow the format of this template:\n");
            system_prompt.push_str(template);
        }
        None => {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(WEEKLY_REPORT_SECTIONS);
        }
    }
    system_prompt.push_str("\n\n");
    system_prompt.push_str(MARKDOWN_OUTPUT);

    let user_message = format!(
        "Here are my daily reports for this week, please write my weekly report:\n\n{}",
        render_daily_logs(logs)
    );

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_message),
    ]
}

pub fn improve_daily_log_messages(content: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(IMPROVE_DAILY_LOG_PROMPT),
        ChatMessage::user(format!(
            "Please improve the following daily report:\n\n{content}"
        )),
    ]
}

fn render_daily_logs(logs: &[DailyLog]) -> String {
    logs.iter()
        .map(|log| format!("[{}]\n{}", log.date, log.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_sdk::Role;

    fn logs() -> Vec<DailyLog> {
        vec![
            DailyLog {
                date: "2024-03-04".to_string(),
                content: "Fixed login bug".to_string(),
            },
            DailyLog {
                date: "2024-03-05".to_string(),
                content: "Reviewed PRs".to_string(),
            },
        ]
    }

    #[test]
    fn ask_uses_default_prompt_when_none_given() {
        for prompt in [None, Some(""), Some("   ")] {
            let messages = ask_messages("what is a KPI?", prompt);
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].role(), Role::System);
            assert_eq!(messages[0].content(), DEFAULT_ASSISTANT_PROMPT);
            assert_eq!(messages[1], ChatMessage::user("what is a KPI?"));
        }
    }

    #[test]
    fn ask_keeps_custom_prompt() {
        let messages = ask_messages("hi", Some("Answer in one word."));
        assert_eq!(messages[0], ChatMessage::system("Answer in one word."));
    }

    #[test]
    fn weekly_report_lists_default_sections_without_template() {
        let messages = weekly_report_messages(&logs(), None);
        let system = messages[0].content();
        assert!(system.starts_with(WEEKLY_REPORT_PROMPT));
        assert!(system.contains("## Plan for next week"));
        assert!(system.ends_with(MARKDOWN_OUTPUT));

        assert_eq!(
            messages[1].content(),
            "Here are my daily reports for this week, please write my weekly report:\n\n\
             [2024-03-04]\nFixed login bug\n\n[2024-03-05]\nReviewed PRs"
        );
    }

    #[test]
    fn weekly_report_follows_template() {
        let messages = weekly_report_messages(&logs(), Some("# Done\n# Next"));
        let system = messages[0].content();
        assert!(system.contains("Follow the format of this template:\n# Done\n# Next"));
        assert!(!system.contains("## Plan for next week"));
    }

    #[test]
    fn improve_daily_log_wraps_content() {
        let messages = improve_daily_log_messages("did stuff");
        assert_eq!(messages[0].content(), IMPROVE_DAILY_LOG_PROMPT);
        assert!(messages[1].content().ends_with("\n\ndid stuff"));
    }
}
