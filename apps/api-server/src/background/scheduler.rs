//! Cron-style job scheduler using tokio-cron-scheduler.

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::state::AppState;

const REMINDERS: &str = "0 0 * * * *";
const HOUSEKEEPING: &str = "0 */10 * * * *";

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    config: SchedulerConfig,
}

impl Scheduler {
    pub async fn new(config: SchedulerConfig) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, config })
    }

    /// Add a cron job.
    ///
    /// # Example
    /// ```ignore
    /// scheduler.add_cron("0 0 * * * *", || async {
    ///     tracing::info!("Running hourly job");
    /// }).await?;
    /// ```
    pub async fn add_cron<F, Fut>(
        &self,
        schedule: &str,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(id)
    }

    /// Register the recurring jobs of the server.
    pub async fn register_defaults(&self, state: &AppState) -> Result<(), JobSchedulerError> {
        let reminders = state.clone();
        self.add_cron(REMINDERS, move || {
            let state = reminders.clone();
            async move {
                match state
                    .notifier
                    .remind_upcoming(state.events.as_ref(), state.cache.as_ref(), Utc::now())
                    .await
                {
                    Ok(sent) => tracing::info!(sent, "Event reminders sent"),
                    Err(e) => tracing::error!(error = %e, "Event reminder run failed"),
                }
            }
        })
        .await?;

        let housekeeping = state.clone();
        self.add_cron(HOUSEKEEPING, move || {
            let state = housekeeping.clone();
            async move {
                state.limiter.shrink();
                let purged = state.cache.purge_expired().await;
                tracing::debug!(
                    purged,
                    tracked_clients = state.limiter.tracked_keys(),
                    "Housekeeping done"
                );
            }
        })
        .await?;

        Ok(())
    }

    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_default_jobs_register() {
        let state = AppState::in_memory(AppConfig::default());
        let scheduler = Scheduler::new(SchedulerConfig { enabled: false })
            .await
            .unwrap();
        scheduler.register_defaults(&state).await.unwrap();
        scheduler.start().await.unwrap();
    }
}
