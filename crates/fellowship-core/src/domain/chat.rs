use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::check_length;
use crate::error::DomainError;

pub const CHAT_MESSAGE_MAX: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of an assistant conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: &str) -> Result<Self, DomainError> {
        let content = content.trim();
        check_length("message", content, 1, CHAT_MESSAGE_MAX)?;
        Ok(Self {
            role: ChatRole::User,
            content: content.to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
