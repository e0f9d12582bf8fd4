//! Email delivery: a webhook to a hosted mail function, or tracing only.

use std::time::Duration;

use async_trait::async_trait;

use fellowship_core::ports::{EmailError, EmailMessage, EmailSender};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Development sender: records the message in the log and succeeds.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %mask_email(&message.to),
            subject = %message.subject,
            "Email delivery skipped (no EMAIL_WEBHOOK_URL configured)"
        );
        Ok(())
    }
}

/// Posts the message as JSON to a serverless mail function.
pub struct WebhookEmailSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookEmailSender {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { url, client }
    }
}

#[async_trait]
impl EmailSender for WebhookEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| EmailError::Temporary(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %mask_email(&message.to), "Email dispatched");
            Ok(())
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(EmailError::Temporary(format!("mail function returned {status}")))
        } else {
            Err(EmailError::Rejected(format!("mail function returned {status}")))
        }
    }
}

/// Mask the local part of an address for logs: `ana@x.org` → `a***@x.org`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) if local.chars().count() > 1 => format!("{first}***@{domain}"),
            _ => format!("***@{domain}"),
        },
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("ana@church.org"), "a***@church.org");
        assert_eq!(mask_email("a@church.org"), "***@church.org");
        assert_eq!(mask_email("nobody"), "***");
    }

    #[tokio::test]
    async fn test_log_sender_succeeds() {
        let message = EmailMessage {
            to: "ana@church.org".into(),
            subject: "New comment".into(),
            body: "Someone replied".into(),
        };
        assert!(LogEmailSender.send(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_temporary() {
        let sender = WebhookEmailSender::new("http://127.0.0.1:9/mail".into());
        let message = EmailMessage {
            to: "ana@church.org".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(matches!(sender.send(&message).await, Err(EmailError::Temporary(_))));
    }
}
