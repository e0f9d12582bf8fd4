//! Background work: notification delivery, queued jobs and cron tasks.

mod notifier;
#[cfg(feature = "scheduler")]
pub mod scheduler;

pub use notifier::{Notifier, job_handler};
