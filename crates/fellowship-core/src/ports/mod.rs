//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod assistant;
mod audit;
mod auth;
mod cache;
mod email;
mod job_queue;
mod pubsub;
mod rate_limit;
mod repository;
mod storage;

pub use assistant::{AssistantError, ChatAssistant};
pub use audit::{AuditEntry, AuditLog, AuditStats};
pub use auth::{AuthError, PasswordService, TokenClaims, TokenService};
pub use cache::{Cache, CacheError};
pub use email::{EmailError, EmailMessage, EmailSender};
pub use job_queue::{Job, JobQueue, JobQueueError, JobResult, QueueStats};
pub use pubsub::{PubSub, PubSubError, PubSubMessage, notification_channel};
pub use rate_limit::{RateLimitError, RateLimitResult, RateLimiter};
pub use repository::{
    BaseRepository, CommentRepository, EventRepository, LikeRepository, NotificationRepository,
    NotificationSettingsRepository, PostRepository, UserRepository,
};
pub use storage::{FileStorage, StorageError, StoredFile};
