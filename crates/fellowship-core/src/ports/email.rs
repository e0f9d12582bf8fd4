//! Outbound email port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// Worth retrying (timeouts, 5xx).
    #[error("Temporary email failure: {0}")]
    Temporary(String),

    #[error("Email rejected: {0}")]
    Rejected(String),
}
