//! Alerting on ERROR-level events.
//!
//! [`AlertLayer`] is a tracing layer that copies error events onto a channel;
//! a background task forwards them to stderr or a chat webhook. Identical
//! alerts inside the cooldown window are collapsed into one.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context};

const BUFFER_SIZE: usize = 100;
const COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AlertMessage {
    fn key(&self) -> String {
        format!("{}|{}", self.target, self.message)
    }

    fn render(&self) -> String {
        let mut text = format!(
            "*ERROR* in `{}` at {}\n{}",
            self.target,
            self.timestamp.to_rfc3339(),
            self.message
        );
        for (name, value) in &self.fields {
            let _ = write!(text, "\n• {name}: {value}");
        }
        text
    }
}

/// Where alerts go.
pub enum AlertSink {
    Console,
    Webhook { url: String, client: reqwest::Client },
}

impl AlertSink {
    pub fn webhook(url: String) -> Self {
        Self::Webhook {
            url,
            client: reqwest::Client::new(),
        }
    }

    async fn deliver(&self, alert: &AlertMessage) {
        match self {
            AlertSink::Console => eprintln!("\n[ALERT] {}\n", alert.render()),
            AlertSink::Webhook { url, client } => {
                let payload = serde_json::json!({ "text": alert.render() });
                // Logging here would feed back into this layer.
                if let Err(e) = client.post(url).json(&payload).send().await {
                    eprintln!("Failed to deliver alert: {e}");
                }
            }
        }
    }
}

/// Suppresses repeats of the same alert within a window.
struct Cooldown {
    window: Duration,
    last_sent: HashMap<String, Instant>,
}

impl Cooldown {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: HashMap::new(),
        }
    }

    fn should_send(&mut self, key: String, now: Instant) -> bool {
        self.last_sent
            .retain(|_, sent| now.duration_since(*sent) < self.window);
        if self.last_sent.contains_key(&key) {
            return false;
        }
        self.last_sent.insert(key, now);
        true
    }
}

/// Tracing layer that forwards ERROR events to an [`AlertSink`].
pub struct AlertLayer {
    sender: mpsc::Sender<AlertMessage>,
}

impl AlertLayer {
    /// Spawns the dispatcher; must be called inside a tokio runtime.
    pub fn new(sink: AlertSink) -> Self {
        let (sender, mut rx) = mpsc::channel::<AlertMessage>(BUFFER_SIZE);

        tokio::spawn(async move {
            let mut cooldown = Cooldown::new(COOLDOWN);
            while let Some(alert) = rx.recv().await {
                if cooldown.should_send(alert.key(), Instant::now()) {
                    sink.deliver(&alert).await;
                }
            }
        });

        Self { sender }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != tracing::Level::ERROR {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        // Full or closed channel: drop the alert rather than block logging.
        let _ = self.sender.try_send(AlertMessage {
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
            timestamp: chrono::Utc::now(),
        });
    }
}
