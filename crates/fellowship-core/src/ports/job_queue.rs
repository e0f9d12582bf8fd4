//! Job queue port - deferred work such as notification fan-out and email.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Routes the job to its handler.
    pub job_type: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            max_attempts: 3,
            created_at: chrono::Utc::now(),
        }
    }

    /// Build a job from any serializable payload.
    pub fn typed<T: Serialize>(job_type: impl Into<String>, payload: &T) -> Result<Self, JobQueueError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| JobQueueError::EnqueueError(e.to_string()))?;
        Ok(Self::new(job_type, value))
    }

    /// Decode the payload back into its typed form.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

#[derive(Debug)]
pub enum JobResult {
    Success,
    /// Failed, retry if attempts remain.
    Retry(String),
    /// Failed permanently.
    Failed(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), JobQueueError>;

    /// Start processing jobs with the given handler.
    async fn start_worker<F>(&self, handler: F) -> Result<(), JobQueueError>
    where
        F: Fn(Job) -> Pin<Box<dyn Future<Output = JobResult> + Send>> + Send + Sync + 'static;

    async fn stats(&self) -> Result<QueueStats, JobQueueError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    #[error("Failed to enqueue job: {0}")]
    EnqueueError(String),

    #[error("Queue is full")]
    QueueFull,

    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        user: String,
    }

    #[test]
    fn test_typed_payload() {
        let job = Job::typed("send_email", &Payload { user: "ana".into() }).unwrap();
        assert_eq!(job.job_type, "send_email");
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.parse::<Payload>().unwrap(), Payload { user: "ana".into() });
    }
}
