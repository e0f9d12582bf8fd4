//! Notification inbox, settings and the live stream.

use std::time::Duration;

use actix_web::{HttpResponse, http::header, web};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use fellowship_core::domain::NotificationSettings;
use fellowship_core::ports::{
    BaseRepository, NotificationRepository, notification_channel,
};
use fellowship_core::{Action, PageRequest, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::{NotificationSettingsDto, UnreadCountResponse};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

/// Comment line sent to keep proxies from closing an idle stream.
const KEEP_ALIVE: Duration = Duration::from_secs(25);
const STREAM_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// GET /api/notifications
pub async fn list(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Read)
        .await?;

    let page = state
        .notifications
        .list_for_user(
            identity.user_id,
            query.unread_only,
            PageRequest::new(query.offset, query.limit),
        )
        .await?
        .map(|n| views::notification(&n));
    Ok(HttpResponse::Ok().json(ApiResponse::ok(page)))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Read)
        .await?;
    let unread = state.notifications.unread_count(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(UnreadCountResponse { unread })))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Update)
        .await?;
    if !state
        .notifications
        .mark_read(path.into_inner(), identity.user_id)
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::message("Notification marked as read")))
}

/// POST /api/notifications/read-all
pub async fn read_all(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Update)
        .await?;
    let updated = state.notifications.mark_all_read(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "updated": updated }))))
}

/// DELETE /api/notifications/{id}
///
/// Other users' notifications are reported as missing.
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Delete)
        .await?;

    let id = path.into_inner();
    match state.notifications.find_by_id(id).await? {
        Some(n) if n.user_id == identity.user_id => {
            state.notifications.delete(id).await?;
            Ok(HttpResponse::Ok().json(ApiResponse::message("Notification deleted")))
        }
        _ => Err(AppError::NotFound("Notification not found".to_string())),
    }
}

/// GET /api/notifications/settings
pub async fn get_settings(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Read)
        .await?;
    let settings = state.notifier.settings_for(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::settings(&settings))))
}

/// PUT /api/notifications/settings
pub async fn update_settings(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<NotificationSettingsDto>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Update)
        .await?;

    let dto = body.into_inner();
    let settings = state
        .settings
        .save(NotificationSettings {
            user_id: identity.user_id,
            email_enabled: dto.email_enabled,
            comments: dto.comments,
            likes: dto.likes,
            events: dto.events,
            reminders: dto.reminders,
            updated_at: Utc::now(),
        })
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::settings(&settings))))
}

/// GET /api/notifications/stream
///
/// Server-sent events; each new notification arrives as a `notification`
/// event carrying the JSON body.
pub async fn stream(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Notification, Action::Read)
        .await?;

    let (tx, rx) = mpsc::channel::<String>(STREAM_BUFFER);
    // Flushes the headers immediately.
    let _ = tx.send(": connected\n\n".to_string()).await;

    let feed = tx.clone();
    let disconnected = tx.clone();
    state
        .pubsub
        .subscribe_until(
            &notification_channel(identity.user_id),
            move |msg| {
                let feed = feed.clone();
                Box::pin(async move {
                    feed.send(format!("event: notification\ndata: {}\n\n", msg.payload))
                        .await
                        .is_ok()
                })
            },
            async move { disconnected.closed().await },
        )
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(KEEP_ALIVE);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = tx.closed() => break,
            }
            if tx.send(": ping\n\n".to_string()).await.is_err() {
                break;
            }
        }
    });

    tracing::debug!(user_id = %identity.user_id, "Notification stream opened");

    let body = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, actix_web::Error>(web::Bytes::from(chunk)), rx))
    });

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(body))
}
