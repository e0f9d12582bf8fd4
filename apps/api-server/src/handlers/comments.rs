//! Comments on board posts.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use fellowship_core::domain::{Comment, NotificationKind};
use fellowship_core::ports::{BaseRepository, CommentRepository};
use fellowship_core::{Action, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::CommentRequest;

use super::PageQuery;
use super::posts::{load_post, post_link};
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

async fn load_comment(state: &AppState, id: Uuid) -> AppResult<Comment> {
    state
        .comments
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// GET /api/posts/{id}/comments
pub async fn list(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Comment, Action::Read)
        .await?;
    let post = load_post(&state, path.into_inner()).await?;

    let page = state
        .comments
        .list_by_post(post.id, query.request())
        .await?
        .map(views::comment);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(page)))
}

/// POST /api/posts/{id}/comments
pub async fn create(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Comment, Action::Create)
        .await?;
    let post = load_post(&state, path.into_inner()).await?;

    let comment = Comment::new(
        post.id,
        identity.user_id,
        identity.display_name.clone(),
        &body.content,
    )?;
    let comment = state.comments.save(comment).await?;

    if post.author_id != identity.user_id {
        let notified = state
            .notifier
            .notify(
                post.author_id,
                NotificationKind::Comment,
                "New comment",
                format!("{} commented on \"{}\"", identity.display_name, post.title),
                Some(post_link(post.id)),
            )
            .await;
        if let Err(e) = notified {
            tracing::warn!(error = %e, post_id = %post.id, "Comment notification failed");
        }
    }

    Ok(HttpResponse::Created().json(ApiResponse::ok(views::comment(comment))))
}

/// PUT /api/comments/{id}
pub async fn update(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    let mut comment = load_comment(&state, path.into_inner()).await?;
    state
        .authorizer
        .require_owner_or_moderator(
            &identity,
            comment.author_id,
            Resource::Comment,
            Action::Update,
            comment.id,
        )
        .await?;

    comment.edit(&body.content)?;
    let comment = state.comments.save(comment).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::comment(comment))))
}

/// DELETE /api/comments/{id}
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let comment = load_comment(&state, path.into_inner()).await?;
    state
        .authorizer
        .require_owner_or_moderator(
            &identity,
            comment.author_id,
            Resource::Comment,
            Action::Delete,
            comment.id,
        )
        .await?;

    state.comments.delete(comment.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Comment deleted")))
}
