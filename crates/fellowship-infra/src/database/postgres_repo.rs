//! PostgreSQL repository implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, DbConn, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use fellowship_core::domain::{
    ApprovalStatus, AttendOutcome, Comment, Event, Notification, Post, PostCategory, User,
};
use fellowship_core::error::RepoError;
use fellowship_core::pagination::{Page, PageRequest};
use fellowship_core::ports::{
    CommentRepository, EventRepository, LikeRepository, NotificationRepository,
    NotificationSettingsRepository, PostRepository, UserRepository,
};

use super::entity::{
    comment, event, event_attendee, notification, notification_settings, post, post_like, user,
};
use super::postgres_base::{PostgresBaseRepository, map_db_err};
use crate::email::mask_email;

pub type PostgresUserRepository = PostgresBaseRepository<user::Entity>;
pub type PostgresPostRepository = PostgresBaseRepository<post::Entity>;
pub type PostgresCommentRepository = PostgresBaseRepository<comment::Entity>;
pub type PostgresEventRepository = PostgresBaseRepository<event::Entity>;
pub type PostgresNotificationRepository = PostgresBaseRepository<notification::Entity>;
pub type PostgresNotificationSettingsRepository =
    PostgresBaseRepository<notification_settings::Entity>;

/// Run an ordered select for one page, over-fetching a row to detect more.
async fn fetch_page<E, T>(
    db: &DbConn,
    query: Select<E>,
    page: PageRequest,
) -> Result<Page<T>, RepoError>
where
    E: EntityTrait,
    T: From<E::Model>,
{
    let rows = query
        .offset(page.offset)
        .limit(page.fetch_limit())
        .all(db)
        .await
        .map_err(map_db_err)?;
    Ok(Page::from_overfetch(rows, page).map(Into::into))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(user_email = %mask_email(email), "Finding user by email");

        let result = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn list_by_status(
        &self,
        status: ApprovalStatus,
        page: PageRequest,
    ) -> Result<Page<User>, RepoError> {
        let query = user::Entity::find()
            .filter(user::Column::Status.eq(status.as_str()))
            .order_by_asc(user::Column::CreatedAt);
        fetch_page(&self.db, query, page).await
    }

    async fn approved_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Status.eq(ApprovalStatus::Approved.as_str()))
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .map_err(map_db_err)
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn list(
        &self,
        category: Option<PostCategory>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let mut query = post::Entity::find();
        if let Some(category) = category {
            query = query.filter(post::Column::Category.eq(category.as_str()));
        }
        let query = query.order_by_desc(post::Column::CreatedAt);
        fetch_page(&self.db, query, page).await
    }

    async fn find_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, RepoError> {
        let result = post::Entity::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .order_by_desc(post::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError> {
        let updated = post::Entity::update_many()
            .col_expr(
                post::Column::ViewCount,
                Expr::col(post::Column::ViewCount).add(1),
            )
            .filter(post::Column::Id.eq(id))
            .exec_with_returning(&self.db)
            .await
            .map_err(map_db_err)?;

        updated
            .first()
            .map(|row| row.view_count)
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn list_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, RepoError> {
        let query = comment::Entity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt);
        fetch_page(&self.db, query, page).await
    }

    async fn count_by_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        comment::Entity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .count(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let result = comment::Entity::delete_many()
            .filter(comment::Column::PostId.eq(post_id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected)
    }
}

/// Likes live in a join table keyed by (post, user).
pub struct PostgresLikeRepository {
    db: DbConn,
}

impl PostgresLikeRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LikeRepository for PostgresLikeRepository {
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let row = post_like::ActiveModel {
            post_id: Set(post_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now().into()),
        };
        let inserted = post_like::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([post_like::Column::PostId, post_like::Column::UserId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(inserted > 0)
    }

    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let result = post_like::Entity::delete_by_id((post_id, user_id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn count(&self, post_id: Uuid) -> Result<u64, RepoError> {
        post_like::Entity::find()
            .filter(post_like::Column::PostId.eq(post_id))
            .count(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let found = post_like::Entity::find_by_id((post_id, user_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(found.is_some())
    }

    async fn clear_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let result = post_like::Entity::delete_many()
            .filter(post_like::Column::PostId.eq(post_id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, RepoError> {
        let result = event::Entity::find()
            .filter(event::Column::StartsAt.lt(to))
            .filter(event::Column::EndsAt.gte(from))
            .order_by_asc(event::Column::StartsAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn attend(&self, event_id: Uuid, user_id: Uuid) -> Result<AttendOutcome, RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let exists = event::Entity::find_by_id(event_id)
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .is_some();
        if !exists {
            txn.rollback().await.map_err(map_db_err)?;
            return Err(RepoError::NotFound);
        }

        let row = event_attendee::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            joined_at: Set(Utc::now().into()),
        };
        let inserted = event_attendee::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    event_attendee::Column::EventId,
                    event_attendee::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(map_db_err)?;
        if inserted == 0 {
            txn.rollback().await.map_err(map_db_err)?;
            return Ok(AttendOutcome::AlreadyAttending);
        }

        // Conditional increment: the row only changes while below capacity,
        // so concurrent joins cannot overshoot `max_attendees`.
        let updated = event::Entity::update_many()
            .col_expr(
                event::Column::AttendeeCount,
                Expr::col(event::Column::AttendeeCount).add(1),
            )
            .filter(event::Column::Id.eq(event_id))
            .filter(
                Condition::any()
                    .add(event::Column::MaxAttendees.is_null())
                    .add(
                        Expr::col(event::Column::AttendeeCount)
                            .lt(Expr::col(event::Column::MaxAttendees)),
                    ),
            )
            .exec_with_returning(&txn)
            .await
            .map_err(map_db_err)?;

        match updated.first() {
            Some(row) => {
                let count = row.attendee_count;
                txn.commit().await.map_err(map_db_err)?;
                Ok(AttendOutcome::Joined(count))
            }
            None => {
                txn.rollback().await.map_err(map_db_err)?;
                Ok(AttendOutcome::Full)
            }
        }
    }

    async fn cancel_attendance(&self, event_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let removed = event_attendee::Entity::delete_by_id((event_id, user_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        if removed.rows_affected == 0 {
            txn.rollback().await.map_err(map_db_err)?;
            return Ok(false);
        }

        event::Entity::update_many()
            .col_expr(
                event::Column::AttendeeCount,
                Expr::col(event::Column::AttendeeCount).sub(1),
            )
            .filter(event::Column::Id.eq(event_id))
            .filter(event::Column::AttendeeCount.gt(0))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(true)
    }

    async fn attendees(&self, event_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        event_attendee::Entity::find()
            .select_only()
            .column(event_attendee::Column::UserId)
            .filter(event_attendee::Column::EventId.eq(event_id))
            .order_by_asc(event_attendee::Column::JoinedAt)
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let found = event_attendee::Entity::find_by_id((event_id, user_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, RepoError> {
        let mut query = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notification::Column::Read.eq(false));
        }
        let query = query.order_by_desc(notification::Column::CreatedAt);
        fetch_page(&self.db, query, page).await
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError> {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected)
    }
}

impl NotificationSettingsRepository for PostgresNotificationSettingsRepository {}
