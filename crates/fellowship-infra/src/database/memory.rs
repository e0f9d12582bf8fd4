//! In-memory repositories used when no database is configured, and in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use fellowship_core::domain::{
    ApprovalStatus, AttendOutcome, Comment, Event, Notification, NotificationSettings, Post,
    PostCategory, User,
};
use fellowship_core::error::RepoError;
use fellowship_core::pagination::{Page, PageRequest};
use fellowship_core::ports::{
    BaseRepository, CommentRepository, EventRepository, LikeRepository, NotificationRepository,
    NotificationSettingsRepository, PostRepository, UserRepository,
};

/// Entities storable in an [`InMemoryRepository`].
pub trait Identified: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;

    /// Secondary key that must be unique across rows, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }

    /// Copies counters owned by dedicated repository calls from the stored
    /// row before an overwrite.
    fn keep_counters(&mut self, _stored: &Self) {}
}

impl Identified for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.email.to_lowercase())
    }
}

impl Identified for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    // Owned by increment_views.
    fn keep_counters(&mut self, stored: &Self) {
        self.view_count = stored.view_count;
    }
}

impl Identified for Comment {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for Notification {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for NotificationSettings {
    fn id(&self) -> Uuid {
        self.user_id
    }
}

/// HashMap behind an async RwLock, keyed by entity id.
pub struct InMemoryRepository<T> {
    rows: RwLock<HashMap<Uuid, T>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Identified> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows matching `keep`, sorted with `order`.
    async fn select(
        &self,
        keep: impl Fn(&T) -> bool,
        order: impl FnMut(&T, &T) -> std::cmp::Ordering,
    ) -> Vec<T> {
        let rows = self.rows.read().await;
        let mut selected: Vec<T> = rows.values().filter(|row| keep(row)).cloned().collect();
        selected.sort_by(order);
        selected
    }
}

#[async_trait]
impl<T: Identified> BaseRepository<T, Uuid> for InMemoryRepository<T> {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, RepoError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn save(&self, mut entity: T) -> Result<T, RepoError> {
        let mut rows = self.rows.write().await;
        if let Some(key) = entity.unique_key() {
            let taken = rows
                .values()
                .any(|row| row.id() != entity.id() && row.unique_key().as_deref() == Some(&key));
            if taken {
                return Err(RepoError::Constraint(format!("duplicate key {key}")));
            }
        }
        if let Some(stored) = rows.get(&entity.id()) {
            entity.keep_counters(stored);
        }
        rows.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.rows
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

pub type InMemoryUserRepository = InMemoryRepository<User>;
pub type InMemoryPostRepository = InMemoryRepository<Post>;
pub type InMemoryCommentRepository = InMemoryRepository<Comment>;
pub type InMemoryNotificationRepository = InMemoryRepository<Notification>;
pub type InMemoryNotificationSettingsRepository = InMemoryRepository<NotificationSettings>;

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let key = email.to_lowercase();
        let rows = self.rows.read().await;
        Ok(rows.values().find(|u| u.email.to_lowercase() == key).cloned())
    }

    async fn list_by_status(
        &self,
        status: ApprovalStatus,
        page: PageRequest,
    ) -> Result<Page<User>, RepoError> {
        let users = self
            .select(
                |u| u.status == status,
                |a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
            )
            .await;
        Ok(Page::from_slice(&users, page))
    }

    async fn approved_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|u| u.is_approved())
            .map(|u| u.id)
            .collect())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn list(
        &self,
        category: Option<PostCategory>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepoError> {
        let posts = self
            .select(
                |p| category.is_none_or(|c| p.category == c),
                |a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
            )
            .await;
        Ok(Page::from_slice(&posts, page))
    }

    async fn find_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, RepoError> {
        Ok(self
            .select(
                |p| p.author_id == author_id,
                |a, b| b.created_at.cmp(&a.created_at),
            )
            .await)
    }

    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError> {
        let mut rows = self.rows.write().await;
        let post = rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.view_count += 1;
        Ok(post.view_count)
    }
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn list_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, RepoError> {
        let comments = self
            .select(
                |c| c.post_id == post_id,
                |a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
            )
            .await;
        Ok(Page::from_slice(&comments, page))
    }

    async fn count_by_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows.values().filter(|c| c.post_id == post_id).count() as u64)
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, c| c.post_id != post_id);
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, RepoError> {
        let items = self
            .select(
                |n| n.user_id == user_id && !(unread_only && n.read),
                |a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
            )
            .await;
        Ok(Page::from_slice(&items, page))
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let mut rows = self.rows.write().await;
        let mut changed = 0;
        for n in rows.values_mut().filter(|n| n.user_id == user_id && !n.read) {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

impl NotificationSettingsRepository for InMemoryNotificationSettingsRepository {}

/// Set of (post, user) pairs.
#[derive(Default)]
pub struct InMemoryLikeRepository {
    likes: RwLock<HashSet<(Uuid, Uuid)>>,
}

impl InMemoryLikeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LikeRepository for InMemoryLikeRepository {
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.likes.write().await.insert((post_id, user_id)))
    }

    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.likes.write().await.remove(&(post_id, user_id)))
    }

    async fn count(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let likes = self.likes.read().await;
        Ok(likes.iter().filter(|(p, _)| *p == post_id).count() as u64)
    }

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.likes.read().await.contains(&(post_id, user_id)))
    }

    async fn clear_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let mut likes = self.likes.write().await;
        let before = likes.len();
        likes.retain(|(p, _)| *p != post_id);
        Ok((before - likes.len()) as u64)
    }
}

#[derive(Default)]
struct EventTable {
    events: HashMap<Uuid, Event>,
    /// Attendees per event, in join order.
    attendees: HashMap<Uuid, Vec<Uuid>>,
}

/// Events and their attendee lists behind one lock, so the capacity check
/// and the counter update happen atomically.
#[derive(Default)]
pub struct InMemoryEventRepository {
    table: RwLock<EventTable>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRepository<Event, Uuid> for InMemoryEventRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, RepoError> {
        Ok(self.table.read().await.events.get(&id).cloned())
    }

    async fn save(&self, mut event: Event) -> Result<Event, RepoError> {
        let mut table = self.table.write().await;
        // The stored counter is owned by attend/cancel.
        if let Some(existing) = table.events.get(&event.id) {
            event.attendee_count = existing.attendee_count;
        }
        table.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut table = self.table.write().await;
        table.attendees.remove(&id);
        table
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, RepoError> {
        let table = self.table.read().await;
        let mut events: Vec<Event> = table
            .events
            .values()
            .filter(|e| e.overlaps(from, to))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn attend(&self, event_id: Uuid, user_id: Uuid) -> Result<AttendOutcome, RepoError> {
        let mut guard = self.table.write().await;
        let table = &mut *guard;
        let event = table.events.get_mut(&event_id).ok_or(RepoError::NotFound)?;
        let attendees = table.attendees.entry(event_id).or_default();

        if attendees.contains(&user_id) {
            return Ok(AttendOutcome::AlreadyAttending);
        }
        if !event.has_capacity() {
            return Ok(AttendOutcome::Full);
        }

        attendees.push(user_id);
        event.attendee_count += 1;
        Ok(AttendOutcome::Joined(event.attendee_count))
    }

    async fn cancel_attendance(&self, event_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut guard = self.table.write().await;
        let table = &mut *guard;
        let Some(attendees) = table.attendees.get_mut(&event_id) else {
            return Ok(false);
        };
        let Some(pos) = attendees.iter().position(|id| *id == user_id) else {
            return Ok(false);
        };
        attendees.remove(pos);
        if let Some(event) = table.events.get_mut(&event_id) {
            event.attendee_count = (event.attendee_count - 1).max(0);
        }
        Ok(true)
    }

    async fn attendees(&self, event_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let table = self.table.read().await;
        Ok(table.attendees.get(&event_id).cloned().unwrap_or_default())
    }

    async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let table = self.table.read().await;
        Ok(table
            .attendees
            .get(&event_id)
            .is_some_and(|ids| ids.contains(&user_id)))
    }
}

/// Every in-memory repository, shared behind `Arc`s.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    pub users: Arc<InMemoryUserRepository>,
    pub posts: Arc<InMemoryPostRepository>,
    pub comments: Arc<InMemoryCommentRepository>,
    pub likes: Arc<InMemoryLikeRepository>,
    pub events: Arc<InMemoryEventRepository>,
    pub notifications: Arc<InMemoryNotificationRepository>,
    pub settings: Arc<InMemoryNotificationSettingsRepository>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fellowship_core::domain::{EventDraft, NotificationKind, PostDraft};

    fn event(max: Option<i32>) -> Event {
        let start = Utc::now() + Duration::days(2);
        Event::new(
            Uuid::new_v4(),
            EventDraft {
                title: "Bible study".into(),
                description: String::new(),
                location: "Room 3".into(),
                latitude: None,
                longitude: None,
                starts_at: start,
                ends_at: start + Duration::hours(2),
                max_attendees: max,
            },
        )
    }

    fn post(category: PostCategory, title: &str) -> Post {
        Post::new(
            Uuid::new_v4(),
            "Ana".into(),
            PostDraft {
                category,
                title: title.into(),
                content: "body".into(),
                image_urls: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_user_email_is_unique() {
        let repo = InMemoryUserRepository::new();
        repo.save(User::new("a@x.org".into(), "A".into(), "h".into()))
            .await
            .unwrap();

        let err = repo
            .save(User::new("A@X.org".into(), "B".into(), "h".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Constraint(_)));

        let found = repo.find_by_email("A@x.ORG").await.unwrap();
        assert_eq!(found.unwrap().display_name, "A");
    }

    #[tokio::test]
    async fn test_save_overwrites_and_delete_reports_missing() {
        let repo = InMemoryPostRepository::new();
        let mut p = repo.save(post(PostCategory::Free, "first")).await.unwrap();
        p.title = "edited".into();
        repo.save(p.clone()).await.unwrap();
        assert_eq!(repo.find_by_id(p.id).await.unwrap().unwrap().title, "edited");

        repo.delete(p.id).await.unwrap();
        assert!(matches!(repo.delete(p.id).await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_post_list_filters_and_pages() {
        let repo = InMemoryPostRepository::new();
        for i in 0..3 {
            repo.save(post(PostCategory::Prayer, &format!("prayer {i}")))
                .await
                .unwrap();
        }
        repo.save(post(PostCategory::Notice, "notice")).await.unwrap();

        let page = repo
            .list(Some(PostCategory::Prayer), PageRequest::new(Some(0), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);

        let all = repo.list(None, PageRequest::default()).await.unwrap();
        assert_eq!(all.items.len(), 4);
        assert!(!all.has_more);
    }

    #[tokio::test]
    async fn test_increment_views() {
        let repo = InMemoryPostRepository::new();
        let p = repo.save(post(PostCategory::Free, "t")).await.unwrap();
        assert_eq!(repo.increment_views(p.id).await.unwrap(), 1);
        assert_eq!(repo.increment_views(p.id).await.unwrap(), 2);
        assert!(matches!(
            repo.increment_views(Uuid::new_v4()).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_post_save_keeps_view_count() {
        let repo = InMemoryPostRepository::new();
        let mut p = repo.save(post(PostCategory::Free, "t")).await.unwrap();
        repo.increment_views(p.id).await.unwrap();
        repo.increment_views(p.id).await.unwrap();

        p.title = "edited".into();
        let saved = repo.save(p).await.unwrap();
        assert_eq!(saved.view_count, 2);
        assert_eq!(saved.title, "edited");
        assert_eq!(repo.find_by_id(saved.id).await.unwrap().unwrap().view_count, 2);
    }

    #[tokio::test]
    async fn test_likes_are_unique_per_user() {
        let repo = InMemoryLikeRepository::new();
        let (post_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(repo.like(post_id, user_id).await.unwrap());
        assert!(!repo.like(post_id, user_id).await.unwrap());
        assert_eq!(repo.count(post_id).await.unwrap(), 1);
        assert!(repo.unlike(post_id, user_id).await.unwrap());
        assert!(!repo.has_liked(post_id, user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_post_children_cleared_per_post() {
        let comments = InMemoryCommentRepository::new();
        let likes = InMemoryLikeRepository::new();
        let (kept, dropped) = (Uuid::new_v4(), Uuid::new_v4());
        let author = Uuid::new_v4();
        for post_id in [kept, dropped, dropped] {
            comments
                .save(Comment::new(post_id, author, "Ana".into(), "Amen").unwrap())
                .await
                .unwrap();
            likes.like(post_id, Uuid::new_v4()).await.unwrap();
        }

        assert_eq!(comments.delete_by_post(dropped).await.unwrap(), 2);
        assert_eq!(likes.clear_post(dropped).await.unwrap(), 2);
        assert_eq!(comments.count_by_post(dropped).await.unwrap(), 0);
        assert_eq!(comments.count_by_post(kept).await.unwrap(), 1);
        assert_eq!(likes.count(kept).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_attend_respects_capacity() {
        let repo = InMemoryEventRepository::new();
        let e = repo.save(event(Some(2))).await.unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(repo.attend(e.id, a).await.unwrap(), AttendOutcome::Joined(1));
        assert_eq!(
            repo.attend(e.id, a).await.unwrap(),
            AttendOutcome::AlreadyAttending
        );
        assert_eq!(repo.attend(e.id, b).await.unwrap(), AttendOutcome::Joined(2));
        assert_eq!(repo.attend(e.id, c).await.unwrap(), AttendOutcome::Full);

        assert!(repo.cancel_attendance(e.id, a).await.unwrap());
        assert!(!repo.cancel_attendance(e.id, a).await.unwrap());
        assert_eq!(repo.attend(e.id, c).await.unwrap(), AttendOutcome::Joined(2));
        assert_eq!(repo.attendees(e.id).await.unwrap(), vec![b, c]);
    }

    #[tokio::test]
    async fn test_concurrent_attend_never_overshoots() {
        let repo = Arc::new(InMemoryEventRepository::new());
        let e = repo.save(event(Some(5))).await.unwrap();

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.attend(e.id, Uuid::new_v4()).await.unwrap() })
            })
            .collect();

        let mut joined = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), AttendOutcome::Joined(_)) {
                joined += 1;
            }
        }

        assert_eq!(joined, 5);
        let stored = repo.find_by_id(e.id).await.unwrap().unwrap();
        assert_eq!(stored.attendee_count, 5);
    }

    #[tokio::test]
    async fn test_event_save_keeps_counter() {
        let repo = InMemoryEventRepository::new();
        let mut e = repo.save(event(None)).await.unwrap();
        repo.attend(e.id, Uuid::new_v4()).await.unwrap();

        e.title = "Renamed".into();
        let saved = repo.save(e).await.unwrap();
        assert_eq!(saved.attendee_count, 1);
    }

    #[tokio::test]
    async fn test_attend_unknown_event() {
        let repo = InMemoryEventRepository::new();
        assert!(matches!(
            repo.attend(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_notifications_read_state() {
        let repo = InMemoryNotificationRepository::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let first = repo
            .save(Notification::new(user, NotificationKind::Like, "t", "m", None))
            .await
            .unwrap();
        repo.save(Notification::new(user, NotificationKind::Comment, "t", "m", None))
            .await
            .unwrap();

        assert!(!repo.mark_read(first.id, other).await.unwrap());
        assert!(repo.mark_read(first.id, user).await.unwrap());
        assert_eq!(repo.unread_count(user).await.unwrap(), 1);

        let unread = repo
            .list_for_user(user, true, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(unread.items.len(), 1);

        assert_eq!(repo.mark_all_read(user).await.unwrap(), 1);
        assert_eq!(repo.unread_count(user).await.unwrap(), 0);
    }
}
