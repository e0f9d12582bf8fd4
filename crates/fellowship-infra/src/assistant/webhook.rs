//! Assistant backed by an external completion endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fellowship_core::domain::{ChatMessage, ChatRole};
use fellowship_core::ports::{AssistantError, ChatAssistant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const SYSTEM_PROMPT: &str = "You are a friendly assistant for a church youth community. Answer briefly and kindly.";

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    reply: String,
}

/// POSTs `{messages: [{role, content}]}` and expects `{reply}` back.
pub struct WebhookAssistant {
    url: String,
    client: reqwest::Client,
}

impl WebhookAssistant {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { url, client }
    }
}

fn wire_messages<'a>(history: &'a [ChatMessage], prompt: &'a str) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(WireMessage {
        role: "system",
        content: SYSTEM_PROMPT,
    });
    messages.extend(history.iter().map(|m| WireMessage {
        role: match m.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        },
        content: &m.content,
    }));
    messages.push(WireMessage {
        role: "user",
        content: prompt,
    });
    messages
}

#[async_trait]
impl ChatAssistant for WebhookAssistant {
    async fn reply(&self, history: &[ChatMessage], prompt: &str) -> Result<String, AssistantError> {
        let body = CompletionRequest {
            messages: wire_messages(history, prompt),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AssistantError::Unavailable(format!(
                "assistant endpoint returned {}",
                response.status()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::BadResponse(e.to_string()))?;

        let reply = parsed.reply.trim();
        if reply.is_empty() {
            return Err(AssistantError::BadResponse("empty reply".into()));
        }
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages_order() {
        let history = vec![ChatMessage::user("hi").unwrap(), ChatMessage::assistant("hello")];
        let messages = wire_messages(&history, "when is service?");
        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages.last().unwrap().content, "when is service?");
    }
}
