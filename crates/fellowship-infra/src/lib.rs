//! # Fellowship Infrastructure
//!
//! Concrete implementations of the ports defined in `fellowship-core`:
//! repositories, auth, cache, pub/sub, jobs, rate limiting, the audit log
//! and outbound integrations (email, assistant, file storage).
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL repositories via SeaORM
//! - `minimal` - no database driver, in-memory repositories only

pub mod assistant;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod database;
pub mod email;
pub mod jobs;
pub mod pubsub;
pub mod rate_limit;
pub mod storage;

pub use assistant::{FaqAssistant, WebhookAssistant};
pub use audit::InMemoryAuditLog;
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};
pub use cache::InMemoryCache;
pub use database::{DatabaseConnections, InMemoryStore};
pub use email::{LogEmailSender, WebhookEmailSender};
pub use jobs::{InMemoryJobQueue, InMemoryJobQueueConfig};
pub use pubsub::InMemoryPubSub;
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};
pub use storage::LocalFileStorage;
