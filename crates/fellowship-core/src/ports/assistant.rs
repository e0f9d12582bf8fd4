//! Chat assistant port.

use async_trait::async_trait;

use crate::domain::ChatMessage;

#[async_trait]
pub trait ChatAssistant: Send + Sync {
    /// Answer `prompt` given the prior conversation (oldest first).
    async fn reply(&self, history: &[ChatMessage], prompt: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Assistant unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed assistant response: {0}")]
    BadResponse(String),
}
