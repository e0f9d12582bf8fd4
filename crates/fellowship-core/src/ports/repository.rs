use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ApprovalStatus, AttendOutcome, Comment, Event, Notification, NotificationSettings, Post,
    PostCategory, User,
};
use crate::error::RepoError;
use crate::pagination::{Page, PageRequest};

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Insert the entity, or overwrite the stored row with the same id.
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete by id; `RepoError::NotFound` when nothing was deleted.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Users in a given approval state, oldest registration first.
    async fn list_by_status(
        &self,
        status: ApprovalStatus,
        page: PageRequest,
    ) -> Result<Page<User>, RepoError>;

    /// Ids of every approved user, for broadcast notifications.
    async fn approved_ids(&self) -> Result<Vec<Uuid>, RepoError>;
}

#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    /// Newest first, optionally restricted to one category.
    async fn list(
        &self,
        category: Option<PostCategory>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError>;

    async fn find_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, RepoError>;

    /// Atomically bump the view counter; returns the new value.
    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// Oldest first.
    async fn list_by_post(&self, post_id: Uuid, page: PageRequest)
    -> Result<Page<Comment>, RepoError>;

    async fn count_by_post(&self, post_id: Uuid) -> Result<u64, RepoError>;

    /// Remove every comment on a post. Returns how many were removed.
    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64, RepoError>;
}

/// Unique (post, user) like pairs.
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Returns `true` if a new like was recorded.
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    /// Returns `true` if an existing like was removed.
    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn count(&self, post_id: Uuid) -> Result<u64, RepoError>;

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    /// Drop every like on a post.
    async fn clear_post(&self, post_id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait EventRepository: BaseRepository<Event, Uuid> {
    /// Events overlapping `[from, to)`, ordered by start.
    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, RepoError>;

    /// Register attendance; the counter only moves while below capacity.
    async fn attend(&self, event_id: Uuid, user_id: Uuid) -> Result<AttendOutcome, RepoError>;

    /// Returns `true` if the user was attending.
    async fn cancel_attendance(&self, event_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn attendees(&self, event_id: Uuid) -> Result<Vec<Uuid>, RepoError>;

    async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait NotificationRepository: BaseRepository<Notification, Uuid> {
    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, RepoError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError>;

    /// Returns `false` when the notification does not belong to the user.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    /// Returns the number of notifications changed.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError>;
}

/// Settings are keyed by user id.
pub trait NotificationSettingsRepository: BaseRepository<NotificationSettings, Uuid> {}
