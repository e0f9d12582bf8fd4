//! Notification delivery: storage, the live feed and queued email.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fellowship_core::RepoError;
use fellowship_core::domain::{Event, Notification, NotificationKind, NotificationSettings};
use fellowship_core::ports::{
    BaseRepository, Cache, EmailError, EmailMessage, EmailSender, EventRepository, Job, JobQueue,
    JobQueueError, JobResult, NotificationRepository, NotificationSettingsRepository, PubSub,
    UserRepository, notification_channel,
};
use fellowship_infra::{InMemoryJobQueue, InMemoryPubSub};

use crate::views;

pub const SEND_EMAIL: &str = "send_email";
pub const BROADCAST_EVENT: &str = "broadcast_event";

/// How far ahead reminders look.
const REMINDER_HORIZON_HOURS: i64 = 24;
/// A reminder marker outlives the horizon so a user is reminded once.
const REMINDER_DEDUP: Duration = Duration::from_secs(48 * 60 * 60);

/// Payload of a `broadcast_event` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBroadcast {
    pub event_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub created_by: Uuid,
}

impl From<&Event> for EventBroadcast {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id,
            title: event.title.clone(),
            starts_at: event.starts_at,
            created_by: event.created_by,
        }
    }
}

fn event_link(event_id: Uuid) -> String {
    format!("/calendar/{event_id}")
}

#[derive(Clone)]
pub struct Notifier {
    notifications: Arc<dyn NotificationRepository>,
    settings: Arc<dyn NotificationSettingsRepository>,
    users: Arc<dyn UserRepository>,
    pubsub: Arc<InMemoryPubSub>,
    jobs: Arc<InMemoryJobQueue>,
}

impl Notifier {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        settings: Arc<dyn NotificationSettingsRepository>,
        users: Arc<dyn UserRepository>,
        pubsub: Arc<InMemoryPubSub>,
        jobs: Arc<InMemoryJobQueue>,
    ) -> Self {
        Self {
            notifications,
            settings,
            users,
            pubsub,
            jobs,
        }
    }

    /// Stored settings, or the defaults for users who never saved any.
    pub async fn settings_for(&self, user_id: Uuid) -> Result<NotificationSettings, RepoError> {
        Ok(self
            .settings
            .find_by_id(user_id)
            .await?
            .unwrap_or_else(|| NotificationSettings::defaults_for(user_id)))
    }

    /// Store and push one notification. `None` when the user muted the kind.
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) -> Result<Option<Notification>, RepoError> {
        let settings = self.settings_for(user_id).await?;
        if !settings.allows(kind) {
            tracing::debug!(user_id = %user_id, kind = %kind, "Notification muted");
            return Ok(None);
        }

        let saved = self
            .notifications
            .save(Notification::new(user_id, kind, title, message, link))
            .await?;

        self.publish(&saved).await;
        if settings.email_enabled {
            self.enqueue_email(&saved).await;
        }
        Ok(Some(saved))
    }

    async fn publish(&self, notification: &Notification) {
        let payload = match serde_json::to_string(&views::notification(notification)) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize notification");
                return;
            }
        };
        if let Err(e) = self
            .pubsub
            .publish(&notification_channel(notification.user_id), &payload)
            .await
        {
            tracing::warn!(error = %e, user_id = %notification.user_id, "Live feed publish failed");
        }
    }

    async fn enqueue_email(&self, notification: &Notification) {
        let user = match self.users.find_by_id(notification.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load recipient for email");
                return;
            }
        };

        let mut body = notification.message.clone();
        if let Some(link) = &notification.link {
            body.push_str("\n\n");
            body.push_str(link);
        }
        let message = EmailMessage {
            to: user.email,
            subject: notification.title.clone(),
            body,
        };

        let queued = match Job::typed(SEND_EMAIL, &message) {
            Ok(job) => self.jobs.enqueue(job).await,
            Err(e) => Err(e),
        };
        if let Err(e) = queued {
            tracing::warn!(error = %e, notification_id = %notification.id, "Email not queued");
        }
    }

    /// Queue the fan-out for a newly created event.
    pub async fn announce_event(&self, event: &Event) -> Result<(), JobQueueError> {
        let job = Job::typed(BROADCAST_EVENT, &EventBroadcast::from(event))?;
        self.jobs.enqueue(job).await
    }

    /// Notify every approved user except the creator. Returns how many were
    /// delivered.
    ///
    /// A failed recipient is logged and skipped: the job is not retried, so
    /// earlier recipients are never notified twice.
    pub async fn broadcast_event(&self, event: &EventBroadcast) -> Result<usize, RepoError> {
        let recipients = self.users.approved_ids().await?;
        let message = format!("Starts {}", event.starts_at.format("%Y-%m-%d %H:%M UTC"));

        let mut delivered = 0;
        for user_id in recipients.into_iter().filter(|id| *id != event.created_by) {
            let sent = self
                .notify(
                    user_id,
                    NotificationKind::Event,
                    format!("New event: {}", event.title),
                    message.clone(),
                    Some(event_link(event.event_id)),
                )
                .await;
            match sent {
                Ok(sent) => delivered += usize::from(sent.is_some()),
                Err(e) => tracing::warn!(
                    error = %e,
                    event_id = %event.event_id,
                    user_id = %user_id,
                    "Event notification failed"
                ),
            }
        }
        Ok(delivered)
    }

    /// Remind attendees of events starting within the next 24 hours. Each
    /// (event, attendee) pair is reminded once.
    pub async fn remind_upcoming(
        &self,
        events: &dyn EventRepository,
        cache: &dyn Cache,
        now: DateTime<Utc>,
    ) -> Result<usize, RepoError> {
        let horizon = now + chrono::Duration::hours(REMINDER_HORIZON_HOURS);
        let upcoming = events.list_between(now, horizon).await?;

        let mut sent = 0;
        for event in upcoming.iter().filter(|e| e.starts_at >= now) {
            let attendees = match events.attendees(event.id).await {
                Ok(attendees) => attendees,
                Err(e) => {
                    tracing::warn!(error = %e, event_id = %event.id, "Could not load attendees");
                    continue;
                }
            };
            for user_id in attendees {
                let key = format!("reminder:{}:{}", event.id, user_id);
                match cache.set_if_absent(&key, "1", REMINDER_DEDUP).await {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Reminder de-duplication unavailable");
                        continue;
                    }
                }

                let mut message =
                    format!("Starts {}", event.starts_at.format("%Y-%m-%d %H:%M UTC"));
                if !event.location.is_empty() {
                    message.push_str(" at ");
                    message.push_str(&event.location);
                }
                let delivered = self
                    .notify(
                        user_id,
                        NotificationKind::Reminder,
                        format!("Reminder: {}", event.title),
                        message,
                        Some(event_link(event.id)),
                    )
                    .await;
                match delivered {
                    Ok(delivered) => sent += usize::from(delivered.is_some()),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            event_id = %event.id,
                            user_id = %user_id,
                            "Reminder failed"
                        );
                        // Release the marker so the next run tries again.
                        if let Err(e) = cache.delete(&key).await {
                            tracing::warn!(error = %e, key = %key, "Reminder marker not released");
                        }
                    }
                }
            }
        }
        Ok(sent)
    }
}

type JobFuture = Pin<Box<dyn Future<Output = JobResult> + Send>>;

/// Handler for the background job queue.
pub fn job_handler(
    notifier: Notifier,
    email: Arc<dyn EmailSender>,
) -> impl Fn(Job) -> JobFuture + Send + Sync + 'static {
    move |job| {
        let notifier = notifier.clone();
        let email = email.clone();
        let fut: JobFuture = Box::pin(async move { handle_job(&notifier, email, job).await });
        fut
    }
}

async fn handle_job(notifier: &Notifier, email: Arc<dyn EmailSender>, job: Job) -> JobResult {
    match job.job_type.as_str() {
        SEND_EMAIL => {
            let message = match job.parse::<EmailMessage>() {
                Ok(message) => message,
                Err(e) => return JobResult::Failed(format!("bad payload: {e}")),
            };
            match email.send(&message).await {
                Ok(()) => JobResult::Success,
                Err(EmailError::Temporary(reason)) => JobResult::Retry(reason),
                Err(EmailError::Rejected(reason)) => JobResult::Failed(reason),
            }
        }
        BROADCAST_EVENT => {
            let payload = match job.parse::<EventBroadcast>() {
                Ok(payload) => payload,
                Err(e) => return JobResult::Failed(format!("bad payload: {e}")),
            };
            match notifier.broadcast_event(&payload).await {
                Ok(delivered) => {
                    tracing::info!(event_id = %payload.event_id, delivered, "Event broadcast");
                    JobResult::Success
                }
                Err(e) => JobResult::Retry(e.to_string()),
            }
        }
        other => JobResult::Failed(format!("unknown job type '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fellowship_core::domain::{ApprovalStatus, EventDraft, User};
    use fellowship_core::ports::QueueStats;
    use fellowship_core::PageRequest;
    use fellowship_infra::database::InMemoryStore;
    use fellowship_infra::database::memory::InMemoryNotificationRepository;
    use fellowship_infra::{InMemoryCache, InMemoryJobQueueConfig};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct Fixture {
        store: InMemoryStore,
        jobs: Arc<InMemoryJobQueue>,
        pubsub: Arc<InMemoryPubSub>,
        notifier: Notifier,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        fixture_with(store.clone(), store.notifications.clone())
    }

    fn fixture_with(store: InMemoryStore, notifications: Arc<dyn NotificationRepository>) -> Fixture {
        let pubsub = Arc::new(InMemoryPubSub::default());
        let jobs = Arc::new(InMemoryJobQueue::new(InMemoryJobQueueConfig {
            max_size: 100,
            workers: 1,
        }));
        let notifier = Notifier::new(
            notifications,
            store.settings.clone(),
            store.users.clone(),
            pubsub.clone(),
            jobs.clone(),
        );
        Fixture {
            store,
            jobs,
            pubsub,
            notifier,
        }
    }

    /// Rejects writes for one user and stores the rest.
    struct BrokenInbox {
        inner: Arc<InMemoryNotificationRepository>,
        broken_for: Mutex<Option<Uuid>>,
    }

    impl BrokenInbox {
        fn fails_for(&self, user_id: Option<Uuid>) {
            *self.broken_for.lock().unwrap() = user_id;
        }
    }

    #[async_trait]
    impl BaseRepository<Notification, Uuid> for BrokenInbox {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, RepoError> {
            self.inner.find_by_id(id).await
        }

        async fn save(&self, entity: Notification) -> Result<Notification, RepoError> {
            if *self.broken_for.lock().unwrap() == Some(entity.user_id) {
                return Err(RepoError::Connection("connection reset".into()));
            }
            self.inner.save(entity).await
        }

        async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
            self.inner.delete(id).await
        }
    }

    #[async_trait]
    impl NotificationRepository for BrokenInbox {
        async fn list_for_user(
            &self,
            user_id: Uuid,
            unread_only: bool,
            page: PageRequest,
        ) -> Result<fellowship_core::Page<Notification>, RepoError> {
            self.inner.list_for_user(user_id, unread_only, page).await
        }

        async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError> {
            self.inner.unread_count(user_id).await
        }

        async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
            self.inner.mark_read(id, user_id).await
        }

        async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError> {
            self.inner.mark_all_read(user_id).await
        }
    }

    fn broken_fixture() -> (Fixture, Arc<BrokenInbox>) {
        let store = InMemoryStore::new();
        let inbox = Arc::new(BrokenInbox {
            inner: store.notifications.clone(),
            broken_for: Mutex::new(None),
        });
        (fixture_with(store, inbox.clone()), inbox)
    }

    async fn approved_user(store: &InMemoryStore, email: &str) -> User {
        let mut user = User::new(email.into(), "Member".into(), "hash".into());
        user.set_status(ApprovalStatus::Approved);
        store.users.save(user).await.unwrap()
    }

    async fn pending(jobs: &InMemoryJobQueue) -> QueueStats {
        jobs.stats().await.unwrap()
    }

    #[tokio::test]
    async fn test_notify_stores_and_publishes() {
        let f = fixture();
        let user = approved_user(&f.store, "a@church.org").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        f.pubsub
            .subscribe(&notification_channel(user.id), move |msg| {
                let tx = tx.clone();
                Box::pin(async move { tx.send(msg.payload).is_ok() })
            })
            .await
            .unwrap();

        let sent = f
            .notifier
            .notify(user.id, NotificationKind::Comment, "New comment", "Amen", None)
            .await
            .unwrap();
        assert!(sent.is_some());
        assert_eq!(f.store.notifications.unread_count(user.id).await.unwrap(), 1);

        let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(payload.contains("\"kind\":\"comment\""));
        // Email is off by default.
        assert_eq!(pending(&f.jobs).await.pending, 0);
    }

    #[tokio::test]
    async fn test_muted_kind_is_skipped() {
        let f = fixture();
        let user = approved_user(&f.store, "a@church.org").await;
        let mut settings = NotificationSettings::defaults_for(user.id);
        settings.likes = false;
        f.store.settings.save(settings).await.unwrap();

        let sent = f
            .notifier
            .notify(user.id, NotificationKind::Like, "Like", "x", None)
            .await
            .unwrap();
        assert!(sent.is_none());
        assert_eq!(f.store.notifications.unread_count(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_email_enabled_queues_job() {
        let f = fixture();
        let user = approved_user(&f.store, "a@church.org").await;
        let mut settings = NotificationSettings::defaults_for(user.id);
        settings.email_enabled = true;
        f.store.settings.save(settings).await.unwrap();

        f.notifier
            .notify(user.id, NotificationKind::Approval, "Welcome", "Approved", None)
            .await
            .unwrap();
        assert_eq!(pending(&f.jobs).await.pending, 1);
    }

    #[tokio::test]
    async fn test_broadcast_skips_creator_and_pending_users() {
        let f = fixture();
        let creator = approved_user(&f.store, "leader@church.org").await;
        let member = approved_user(&f.store, "member@church.org").await;
        let waiting = f
            .store
            .users
            .save(User::new("new@church.org".into(), "New".into(), "hash".into()))
            .await
            .unwrap();

        let delivered = f
            .notifier
            .broadcast_event(&EventBroadcast {
                event_id: Uuid::new_v4(),
                title: "Retreat".into(),
                starts_at: Utc::now(),
                created_by: creator.id,
            })
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(f.store.notifications.unread_count(member.id).await.unwrap(), 1);
        assert_eq!(f.store.notifications.unread_count(creator.id).await.unwrap(), 0);
        assert_eq!(f.store.notifications.unread_count(waiting.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reminders_are_sent_once() {
        let f = fixture();
        let cache = InMemoryCache::new();
        let user = approved_user(&f.store, "a@church.org").await;
        let now = Utc::now();

        let draft = |hours: i64| EventDraft {
            title: format!("In {hours}h"),
            description: String::new(),
            location: "Hall".into(),
            latitude: None,
            longitude: None,
            starts_at: now + chrono::Duration::hours(hours),
            ends_at: now + chrono::Duration::hours(hours + 2),
            max_attendees: None,
        };
        let soon = f.store.events.save(Event::new(user.id, draft(3))).await.unwrap();
        let later = f.store.events.save(Event::new(user.id, draft(72))).await.unwrap();
        f.store.events.attend(soon.id, user.id).await.unwrap();
        f.store.events.attend(later.id, user.id).await.unwrap();

        let first = f
            .notifier
            .remind_upcoming(f.store.events.as_ref(), &cache, now)
            .await
            .unwrap();
        let second = f
            .notifier
            .remind_upcoming(f.store.events.as_ref(), &cache, now)
            .await
            .unwrap();
        assert_eq!((first, second), (1, 0));

        let page = f
            .store
            .notifications
            .list_for_user(user.id, false, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].kind, NotificationKind::Reminder);
        assert_eq!(page.items[0].link.as_deref(), Some(event_link(soon.id).as_str()));
    }

    #[tokio::test]
    async fn test_broadcast_skips_failed_recipient() {
        let (f, inbox) = broken_fixture();
        let creator = approved_user(&f.store, "leader@church.org").await;
        let first = approved_user(&f.store, "first@church.org").await;
        let broken = approved_user(&f.store, "broken@church.org").await;
        let last = approved_user(&f.store, "last@church.org").await;
        inbox.fails_for(Some(broken.id));

        let job = Job::typed(
            BROADCAST_EVENT,
            &EventBroadcast {
                event_id: Uuid::new_v4(),
                title: "Retreat".into(),
                starts_at: Utc::now(),
                created_by: creator.id,
            },
        )
        .unwrap();
        let sender = Arc::new(RecordingSender {
            outcome: || Ok(()),
            sent: Mutex::new(Vec::new()),
        });
        let handler = job_handler(f.notifier.clone(), sender);
        assert!(matches!(handler(job).await, JobResult::Success));

        assert_eq!(f.store.notifications.unread_count(first.id).await.unwrap(), 1);
        assert_eq!(f.store.notifications.unread_count(last.id).await.unwrap(), 1);
        assert_eq!(f.store.notifications.unread_count(broken.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_reminder_is_retried_next_run() {
        let (f, inbox) = broken_fixture();
        let cache = InMemoryCache::new();
        let broken = approved_user(&f.store, "broken@church.org").await;
        let other = approved_user(&f.store, "other@church.org").await;
        let now = Utc::now();

        let start = now + chrono::Duration::hours(2);
        let event = f
            .store
            .events
            .save(Event::new(
                other.id,
                EventDraft {
                    title: "Prayer night".into(),
                    description: String::new(),
                    location: String::new(),
                    latitude: None,
                    longitude: None,
                    starts_at: start,
                    ends_at: start + chrono::Duration::hours(1),
                    max_attendees: None,
                },
            ))
            .await
            .unwrap();
        f.store.events.attend(event.id, broken.id).await.unwrap();
        f.store.events.attend(event.id, other.id).await.unwrap();

        inbox.fails_for(Some(broken.id));
        let first = f
            .notifier
            .remind_upcoming(f.store.events.as_ref(), &cache, now)
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(f.store.notifications.unread_count(other.id).await.unwrap(), 1);

        inbox.fails_for(None);
        let second = f
            .notifier
            .remind_upcoming(f.store.events.as_ref(), &cache, now)
            .await
            .unwrap();
        assert_eq!(second, 1);
        assert_eq!(f.store.notifications.unread_count(broken.id).await.unwrap(), 1);
        assert_eq!(f.store.notifications.unread_count(other.id).await.unwrap(), 1);
    }

    struct RecordingSender {
        outcome: fn() -> Result<(), EmailError>,
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.sent.lock().unwrap().push(message.clone());
            (self.outcome)()
        }
    }

    fn email_job() -> Job {
        Job::typed(
            SEND_EMAIL,
            &EmailMessage {
                to: "a@church.org".into(),
                subject: "Hi".into(),
                body: "Body".into(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_job_handler_maps_email_outcomes() {
        let f = fixture();

        let ok = Arc::new(RecordingSender {
            outcome: || Ok(()),
            sent: Mutex::new(Vec::new()),
        });
        let handler = job_handler(f.notifier.clone(), ok.clone());
        assert!(matches!(handler(email_job()).await, JobResult::Success));
        assert_eq!(ok.sent.lock().unwrap().len(), 1);

        let flaky = Arc::new(RecordingSender {
            outcome: || Err(EmailError::Temporary("503".into())),
            sent: Mutex::new(Vec::new()),
        });
        let handler = job_handler(f.notifier.clone(), flaky);
        assert!(matches!(handler(email_job()).await, JobResult::Retry(_)));

        let rejected = Arc::new(RecordingSender {
            outcome: || Err(EmailError::Rejected("bad address".into())),
            sent: Mutex::new(Vec::new()),
        });
        let handler = job_handler(f.notifier.clone(), rejected);
        assert!(matches!(handler(email_job()).await, JobResult::Failed(_)));

        let junk = Job::new(SEND_EMAIL, serde_json::json!({ "nope": 1 }));
        assert!(matches!(handler(junk).await, JobResult::Failed(_)));
        let unknown = Job::new("mystery", serde_json::json!({}));
        assert!(matches!(handler(unknown).await, JobResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_announce_event_queues_broadcast() {
        let f = fixture();
        let start = Utc::now() + chrono::Duration::days(2);
        let event = Event::new(
            Uuid::new_v4(),
            EventDraft {
                title: "Picnic".into(),
                description: String::new(),
                location: String::new(),
                latitude: None,
                longitude: None,
                starts_at: start,
                ends_at: start + chrono::Duration::hours(2),
                max_attendees: None,
            },
        );
        f.notifier.announce_event(&event).await.unwrap();
        assert_eq!(pending(&f.jobs).await.pending, 1);
    }
}
