//! In-memory job queue for notification fan-out and email delivery.
//!
//! Jobs live in a bounded mpsc channel drained by a pool of tokio workers.
//! Pending jobs are lost on restart.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use fellowship_core::ports::{Job, JobQueue, JobQueueError, JobResult, QueueStats};

/// Linear retry backoff step.
const RETRY_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct InMemoryJobQueueConfig {
    /// Maximum pending jobs (0 = unlimited).
    pub max_size: usize,
    pub workers: usize,
}

impl Default for InMemoryJobQueueConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            workers: 4,
        }
    }
}

impl InMemoryJobQueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: std::env::var("JOB_QUEUE_MAX_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            workers: std::env::var("JOB_QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
        }
    }
}

#[derive(Default)]
struct JobStats {
    pending: AtomicUsize,
    processing: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

type SharedHandler =
    Arc<dyn Fn(Job) -> Pin<Box<dyn Future<Output = JobResult> + Send>> + Send + Sync>;

pub struct InMemoryJobQueue {
    stats: Arc<JobStats>,
    config: InMemoryJobQueueConfig,
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl InMemoryJobQueue {
    pub fn new(config: InMemoryJobQueueConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.max_size.max(100));
        Self {
            stats: Arc::new(JobStats::default()),
            config,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

async fn run_worker(
    worker_id: usize,
    handler: SharedHandler,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    sender: mpsc::Sender<Job>,
    stats: Arc<JobStats>,
) {
    tracing::debug!(worker = worker_id, "Job worker started");

    loop {
        let next = { receiver.lock().await.recv().await };
        let Some(mut job) = next else {
            tracing::debug!(worker = worker_id, "Job worker shutting down");
            break;
        };

        stats.pending.fetch_sub(1, Ordering::Relaxed);
        stats.processing.fetch_add(1, Ordering::Relaxed);
        job.attempts += 1;

        tracing::debug!(
            worker = worker_id,
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            "Processing job"
        );

        let result = handler(job.clone()).await;
        stats.processing.fetch_sub(1, Ordering::Relaxed);

        match result {
            JobResult::Success => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            JobResult::Retry(reason) if job.attempts < job.max_attempts => {
                tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    reason = %reason,
                    "Job failed, will retry"
                );
                stats.pending.fetch_add(1, Ordering::Relaxed);
                let sender = sender.clone();
                let stats = stats.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(RETRY_STEP * job.attempts).await;
                    if let Err(e) = sender.send(job).await {
                        stats.pending.fetch_sub(1, Ordering::Relaxed);
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!("Failed to re-enqueue job for retry: {}", e);
                    }
                });
            }
            JobResult::Retry(reason) | JobResult::Failed(reason) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempts = job.attempts,
                    reason = %reason,
                    "Job failed permanently"
                );
            }
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), JobQueueError> {
        if self.config.max_size > 0
            && self.stats.pending.load(Ordering::Relaxed) >= self.config.max_size
        {
            return Err(JobQueueError::QueueFull);
        }

        self.stats.pending.fetch_add(1, Ordering::Relaxed);
        let job_type = job.job_type.clone();
        if let Err(e) = self.sender.send(job).await {
            self.stats.pending.fetch_sub(1, Ordering::Relaxed);
            return Err(JobQueueError::EnqueueError(e.to_string()));
        }

        tracing::debug!(job_type = %job_type, "Job enqueued");
        Ok(())
    }

    async fn start_worker<F>(&self, handler: F) -> Result<(), JobQueueError>
    where
        F: Fn(Job) -> Pin<Box<dyn Future<Output = JobResult> + Send>> + Send + Sync + 'static,
    {
        let handler: SharedHandler = Arc::new(handler);

        for worker_id in 0..self.config.workers.max(1) {
            tokio::spawn(run_worker(
                worker_id,
                handler.clone(),
                self.receiver.clone(),
                self.sender.clone(),
                self.stats.clone(),
            ));
        }

        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, JobQueueError> {
        Ok(QueueStats {
            pending: self.stats.pending.load(Ordering::Relaxed),
            processing: self.stats.processing.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    async fn wait_for<F: Fn(&QueueStats) -> bool>(queue: &InMemoryJobQueue, done: F) -> QueueStats {
        for _ in 0..100 {
            let stats = queue.stats().await.unwrap();
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        queue.stats().await.unwrap()
    }

    #[tokio::test]
    async fn test_jobs_are_processed() {
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig { max_size: 10, workers: 2 });
        queue
            .start_worker(|_job| Box::pin(async { JobResult::Success }))
            .await
            .unwrap();

        for _ in 0..3 {
            queue.enqueue(Job::new("send_email", serde_json::json!({}))).await.unwrap();
        }

        let stats = wait_for(&queue, |s| s.completed == 3).await;
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig { max_size: 10, workers: 1 });
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        queue
            .start_worker(move |_job| {
                let counter = counter.clone();
                Box::pin(async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        JobResult::Retry("transient".into())
                    } else {
                        JobResult::Success
                    }
                })
            })
            .await
            .unwrap();

        queue.enqueue(Job::new("send_email", serde_json::json!({}))).await.unwrap();
        let stats = wait_for(&queue, |s| s.completed == 1).await;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig { max_size: 10, workers: 1 });
        queue
            .start_worker(|_job| Box::pin(async { JobResult::Retry("down".into()) }))
            .await
            .unwrap();

        queue
            .enqueue(Job::new("send_email", serde_json::json!({})).with_max_attempts(2))
            .await
            .unwrap();
        let stats = wait_for(&queue, |s| s.failed == 1).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_queue_full() {
        // No workers started, so nothing drains.
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig { max_size: 1, workers: 1 });
        queue.enqueue(Job::new("a", serde_json::json!({}))).await.unwrap();
        let err = queue.enqueue(Job::new("b", serde_json::json!({}))).await;
        assert!(matches!(err, Err(JobQueueError::QueueFull)));
    }
}
