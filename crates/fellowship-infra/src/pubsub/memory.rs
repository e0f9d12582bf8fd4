//! In-process pub/sub over tokio broadcast channels.
//!
//! Feeds live notification streams; works within a single server process.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use fellowship_core::ports::{PubSub, PubSubError, PubSubMessage};

pub struct InMemoryPubSub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
    buffer_size: usize,
}

impl InMemoryPubSub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            buffer_size,
        }
    }

    /// Live subscribers on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Like [`PubSub::subscribe`], but the subscription also ends as soon as
    /// `closed` resolves, without waiting for the next message.
    pub async fn subscribe_until<F, C>(
        &self,
        channel: &str,
        handler: F,
        closed: C,
    ) -> Result<(), PubSubError>
    where
        F: Fn(PubSubMessage) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static,
        C: Future<Output = ()> + Send + 'static,
    {
        let mut receiver = {
            let mut channels = self.channels.write().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer_size).0)
                .subscribe()
        };

        let channel_name = channel.to_string();
        let channels = self.channels.clone();

        tokio::spawn(async move {
            tracing::debug!(channel = %channel_name, "Subscribed to channel");
            tokio::pin!(closed);

            loop {
                let received = tokio::select! {
                    received = receiver.recv() => received,
                    () = &mut closed => break,
                };
                match received {
                    Ok(payload) => {
                        let msg = PubSubMessage {
                            channel: channel_name.clone(),
                            payload,
                        };
                        if !handler(msg).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!(
                            channel = %channel_name,
                            lagged = count,
                            "Subscriber lagged behind"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            drop(receiver);

            // Forget channels nobody listens to any more.
            let mut map = channels.write().await;
            if map
                .get(&channel_name)
                .map(|s| s.receiver_count() == 0)
                .unwrap_or(false)
            {
                map.remove(&channel_name);
            }
            tracing::debug!(channel = %channel_name, "Subscription ended");
        });

        Ok(())
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl PubSub for InMemoryPubSub {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), PubSubError> {
        let channels = self.channels.read().await;

        match channels.get(channel) {
            Some(sender) => {
                // No receivers left is not an error for a change feed.
                let _ = sender.send(message.to_string());
                tracing::debug!(channel = %channel, "Message published");
            }
            None => tracing::trace!(channel = %channel, "No subscribers for channel"),
        }

        Ok(())
    }

    async fn subscribe<F>(&self, channel: &str, handler: F) -> Result<(), PubSubError>
    where
        F: Fn(PubSubMessage) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static,
    {
        self.subscribe_until(channel, handler, std::future::pending())
            .await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), PubSubError> {
        self.channels.write().await.remove(channel);
        tracing::debug!(channel = %channel, "Channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let pubsub = InMemoryPubSub::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        pubsub
            .subscribe("notifications:a", move |msg| {
                let tx = tx.clone();
                Box::pin(async move { tx.send(msg.payload).is_ok() })
            })
            .await
            .unwrap();

        pubsub.publish("notifications:a", "hello").await.unwrap();
        pubsub.publish("notifications:b", "not for a").await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_handler_returning_false_ends_subscription() {
        let pubsub = InMemoryPubSub::default();
        pubsub
            .subscribe("once", |_msg| Box::pin(async { false }))
            .await
            .unwrap();
        assert_eq!(pubsub.subscriber_count("once").await, 1);

        pubsub.publish("once", "x").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pubsub.subscriber_count("once").await, 0);
    }

    #[tokio::test]
    async fn test_close_signal_ends_idle_subscription() {
        let pubsub = InMemoryPubSub::default();
        let (close, closed) = tokio::sync::oneshot::channel::<()>();
        pubsub
            .subscribe_until("idle", |_msg| Box::pin(async { true }), async move {
                let _ = closed.await;
            })
            .await
            .unwrap();
        assert_eq!(pubsub.subscriber_count("idle").await, 1);

        drop(close);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pubsub.subscriber_count("idle").await, 0);
    }
}
