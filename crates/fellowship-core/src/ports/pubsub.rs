//! Pub/Sub port - realtime change feed between the API and live clients.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// Channel carrying new notifications for one user.
pub fn notification_channel(user_id: uuid::Uuid) -> String {
    format!("notifications:{user_id}")
}

#[derive(Debug, Clone)]
pub struct PubSubMessage {
    pub channel: String,
    pub payload: String,
}

#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), PubSubError>;

    /// Subscribe with a handler. The subscription ends when the handler
    /// returns `false` or the channel is dropped.
    async fn subscribe<F>(&self, channel: &str, handler: F) -> Result<(), PubSubError>
    where
        F: Fn(PubSubMessage) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static;

    async fn unsubscribe(&self, channel: &str) -> Result<(), PubSubError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("Failed to publish: {0}")]
    PublishError(String),

    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    #[error("Connection error: {0}")]
    Connection(String),
}
