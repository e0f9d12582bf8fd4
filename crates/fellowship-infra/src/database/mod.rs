//! Persistence: SeaORM repositories for PostgreSQL and in-memory fallbacks.

mod connections;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod entity;
#[cfg(feature = "postgres")]
mod postgres_base;
#[cfg(feature = "postgres")]
pub mod postgres_repo;

pub use connections::{DatabaseConfig, DatabaseConnections};
pub use memory::{
    InMemoryEventRepository, InMemoryLikeRepository, InMemoryRepository, InMemoryStore,
};

#[cfg(feature = "postgres")]
pub use sea_orm::DbConn;

#[cfg(feature = "postgres")]
pub use postgres_repo::{
    PostgresCommentRepository, PostgresEventRepository, PostgresLikeRepository,
    PostgresNotificationRepository, PostgresNotificationSettingsRepository,
    PostgresPostRepository, PostgresUserRepository,
};
