//! Keyword-matching assistant for common community questions.

use async_trait::async_trait;

use fellowship_core::domain::ChatMessage;
use fellowship_core::ports::{AssistantError, ChatAssistant};

struct Rule {
    keywords: &'static [&'static str],
    answer: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        keywords: &["worship", "service", "sunday", "예배"],
        answer: "Sunday worship starts at 11:00 and youth service at 14:00. Check the calendar for special services.",
    },
    Rule {
        keywords: &["event", "calendar", "retreat", "schedule", "일정"],
        answer: "Upcoming events are listed in the Calendar tab. Open an event and press Attend to save your spot.",
    },
    Rule {
        keywords: &["prayer", "pray", "기도"],
        answer: "You can share a prayer request on the board under the Prayer category. Leaders read every request.",
    },
    Rule {
        keywords: &["approve", "approval", "pending", "승인"],
        answer: "New accounts are reviewed by an admin. You will get a notification as soon as yours is approved.",
    },
    Rule {
        keywords: &["notification", "email", "alarm", "알림"],
        answer: "Notification preferences, including email, can be changed under Settings > Notifications.",
    },
    Rule {
        keywords: &["help", "how", "도움"],
        answer: "I can help with service times, events, prayer requests, account approval and notification settings.",
    },
];

const FALLBACK: &str = "I'm not sure about that one. Please ask a leader, or try asking about services, events or prayer requests.";

/// Answers from a fixed rule table; the first rule whose keyword appears
/// in the prompt wins.
#[derive(Default)]
pub struct FaqAssistant;

impl FaqAssistant {
    pub fn new() -> Self {
        Self
    }

    fn answer(prompt: &str) -> &'static str {
        let prompt = prompt.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| prompt.contains(k)))
            .map(|rule| rule.answer)
            .unwrap_or(FALLBACK)
    }
}

#[async_trait]
impl ChatAssistant for FaqAssistant {
    async fn reply(&self, _history: &[ChatMessage], prompt: &str) -> Result<String, AssistantError> {
        Ok(Self::answer(prompt).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyword_answers() {
        let assistant = FaqAssistant::new();
        let reply = assistant.reply(&[], "When is Sunday service?").await.unwrap();
        assert!(reply.contains("11:00"));

        let reply = assistant.reply(&[], "기도 제목 올리는 법").await.unwrap();
        assert!(reply.contains("Prayer"));
    }

    #[tokio::test]
    async fn test_fallback() {
        let reply = FaqAssistant::new().reply(&[], "favourite colour?").await.unwrap();
        assert_eq!(reply, FALLBACK);
    }
}
