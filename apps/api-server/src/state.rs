//! Application state - shared across all handlers.

use std::sync::Arc;

use fellowship_core::PermissionMatrix;
use fellowship_core::ports::{
    AuditLog, ChatAssistant, CommentRepository, EmailSender, EventRepository, FileStorage,
    LikeRepository, NotificationRepository, NotificationSettingsRepository, PasswordService,
    PostRepository, TokenService, UserRepository,
};
use fellowship_infra::database::{DatabaseConnections, InMemoryStore};
use fellowship_infra::{
    Argon2PasswordService, FaqAssistant, InMemoryAuditLog, InMemoryCache, InMemoryJobQueue,
    InMemoryPubSub, InMemoryRateLimiter, JwtTokenService, LocalFileStorage, LogEmailSender,
    WebhookAssistant, WebhookEmailSender,
};

#[cfg(feature = "postgres")]
use fellowship_infra::database::{
    DbConn, PostgresCommentRepository, PostgresEventRepository, PostgresLikeRepository,
    PostgresNotificationRepository, PostgresNotificationSettingsRepository,
    PostgresPostRepository, PostgresUserRepository,
};

use crate::background::Notifier;
use crate::config::AppConfig;
use crate::middleware::authorize::Authorizer;

/// Repository handles behind their ports.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub events: Arc<dyn EventRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub settings: Arc<dyn NotificationSettingsRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        Self {
            users: store.users,
            posts: store.posts,
            comments: store.comments,
            likes: store.likes,
            events: store.events,
            notifications: store.notifications,
            settings: store.settings,
        }
    }

    #[cfg(feature = "postgres")]
    pub fn postgres(db: &DbConn) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(db.clone())),
            posts: Arc::new(PostgresPostRepository::new(db.clone())),
            comments: Arc::new(PostgresCommentRepository::new(db.clone())),
            likes: Arc::new(PostgresLikeRepository::new(db.clone())),
            events: Arc::new(PostgresEventRepository::new(db.clone())),
            notifications: Arc::new(PostgresNotificationRepository::new(db.clone())),
            settings: Arc::new(PostgresNotificationSettingsRepository::new(db.clone())),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub events: Arc<dyn EventRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub settings: Arc<dyn NotificationSettingsRepository>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub audit: Arc<dyn AuditLog>,
    pub authorizer: Authorizer,
    pub notifier: Notifier,
    pub email: Arc<dyn EmailSender>,
    pub storage: Arc<dyn FileStorage>,
    pub assistant: Arc<dyn ChatAssistant>,
    // In-process backends, held concretely for their maintenance hooks.
    pub cache: Arc<InMemoryCache>,
    pub pubsub: Arc<InMemoryPubSub>,
    pub jobs: Arc<InMemoryJobQueue>,
    pub limiter: Arc<InMemoryRateLimiter>,
    pub db: Option<Arc<DatabaseConnections>>,
}

impl AppState {
    /// Build the application state, connecting to PostgreSQL when configured.
    pub async fn new(config: AppConfig) -> Self {
        #[cfg(feature = "postgres")]
        let (db, repos) = match &config.database {
            Some(db_config) => match DatabaseConnections::init(db_config).await {
                Ok(connections) => {
                    let repos = Repositories::postgres(&connections.main);
                    (Some(Arc::new(connections)), repos)
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                    (None, Repositories::in_memory())
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
                (None, Repositories::in_memory())
            }
        };

        #[cfg(not(feature = "postgres"))]
        let (db, repos) = {
            tracing::info!("Running without postgres feature - using in-memory repositories");
            (None, Repositories::in_memory())
        };

        Self::assemble(config, repos, db)
    }

    /// State backed entirely by in-memory repositories.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::assemble(config, Repositories::in_memory(), None)
    }

    fn assemble(
        config: AppConfig,
        repos: Repositories,
        db: Option<Arc<DatabaseConnections>>,
    ) -> Self {
        let audit: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new(config.audit.capacity));
        let authorizer = Authorizer::new(
            Arc::new(PermissionMatrix::standard()),
            audit.clone(),
            config.audit.clone(),
        );

        let pubsub = Arc::new(InMemoryPubSub::default());
        let jobs = Arc::new(InMemoryJobQueue::new(config.jobs.clone()));
        let notifier = Notifier::new(
            repos.notifications.clone(),
            repos.settings.clone(),
            repos.users.clone(),
            pubsub.clone(),
            jobs.clone(),
        );

        let email: Arc<dyn EmailSender> = match &config.email_webhook_url {
            Some(url) => Arc::new(WebhookEmailSender::new(url.clone())),
            None => Arc::new(LogEmailSender),
        };
        let assistant: Arc<dyn ChatAssistant> = match &config.assistant_webhook_url {
            Some(url) => Arc::new(WebhookAssistant::new(url.clone())),
            None => Arc::new(FaqAssistant::new()),
        };

        let state = Self {
            users: repos.users,
            posts: repos.posts,
            comments: repos.comments,
            likes: repos.likes,
            events: repos.events,
            notifications: repos.notifications,
            settings: repos.settings,
            tokens: Arc::new(JwtTokenService::new(config.jwt.clone())),
            passwords: Arc::new(Argon2PasswordService::new()),
            audit,
            authorizer,
            notifier,
            email,
            storage: Arc::new(LocalFileStorage::new(config.upload_dir.clone())),
            assistant,
            cache: Arc::new(InMemoryCache::new()),
            pubsub,
            jobs,
            limiter: Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone())),
            db,
            config: Arc::new(config),
        };

        tracing::info!(
            database = state.db.is_some(),
            admins = state.config.admin_emails.len(),
            "Application state initialized"
        );
        state
    }
}
