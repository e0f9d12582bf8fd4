//! Admin screens: account approval, roles and the permission audit.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use fellowship_core::domain::{ApprovalStatus, NotificationKind, Role, User};
use fellowship_core::ports::{AuditEntry, BaseRepository, UserRepository};
use fellowship_core::{Action, PageRequest, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::UpdateRoleRequest;

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

const AUDIT_DEFAULT_LIMIT: usize = 100;
const AUDIT_MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<usize>,
}

async fn load_user(state: &AppState, id: Uuid) -> AppResult<User> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// GET /api/admin/users?status=pending
pub async fn list_users(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<StatusQuery>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::User, Action::Read)
        .await?;

    let status = match query.status.as_deref() {
        Some(s) => s.parse::<ApprovalStatus>()?,
        None => ApprovalStatus::Pending,
    };
    let page = state
        .users
        .list_by_status(status, PageRequest::new(query.offset, query.limit))
        .await?
        .map(|u| views::user(&u));
    Ok(HttpResponse::Ok().json(ApiResponse::ok(page)))
}

async fn decide_registration(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    status: ApprovalStatus,
) -> AppResult<User> {
    state
        .authorizer
        .require_owner_or_moderator(identity, id, Resource::User, Action::Manage, id)
        .await?;
    if id == identity.user_id {
        return Err(AppError::Forbidden(
            "Admins cannot change their own approval".to_string(),
        ));
    }

    let mut user = load_user(state, id).await?;
    user.set_status(status);
    let user = state.users.save(user).await?;

    tracing::info!(
        admin_id = %identity.user_id,
        user_id = %user.id,
        status = %status,
        "Registration decided"
    );

    let (title, message) = match status {
        ApprovalStatus::Approved => ("Account approved", "Welcome! Your account has been approved."),
        _ => ("Account not approved", "Your registration was not approved."),
    };
    if let Err(e) = state
        .notifier
        .notify(user.id, NotificationKind::Approval, title, message, None)
        .await
    {
        tracing::warn!(error = %e, user_id = %user.id, "Approval notification failed");
    }
    Ok(user)
}

/// POST /api/admin/users/{id}/approve
pub async fn approve(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user = decide_registration(&state, &identity, path.into_inner(), ApprovalStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(views::user(&user), "User approved")))
}

/// POST /api/admin/users/{id}/reject
pub async fn reject(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user = decide_registration(&state, &identity, path.into_inner(), ApprovalStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(views::user(&user), "User rejected")))
}

/// PUT /api/admin/users/{id}/role
pub async fn set_role(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRoleRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    state
        .authorizer
        .require_owner_or_moderator(&identity, id, Resource::User, Action::Manage, id)
        .await?;

    let role: Role = body.role.parse()?;
    let mut user = load_user(&state, id).await?;
    if user.id == identity.user_id && role < user.role {
        return Err(AppError::Forbidden("Admins cannot demote themselves".to_string()));
    }

    let previous = user.role;
    user.set_role(role);
    let user = state.users.save(user).await?;

    state
        .audit
        .record(
            AuditEntry::new(
                Some(identity.user_id),
                Some(identity.role),
                Resource::User,
                Action::Manage,
                true,
            )
            .with_target(user.id)
            .with_detail(format!("role {previous} -> {role}")),
        )
        .await;
    tracing::info!(admin_id = %identity.user_id, user_id = %user.id, %previous, %role, "Role changed");

    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::user(&user))))
}

/// GET /api/admin/audit?user_id&limit
pub async fn audit(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<AuditQuery>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::AuditLog, Action::Read)
        .await?;

    let limit = query
        .limit
        .unwrap_or(AUDIT_DEFAULT_LIMIT)
        .clamp(1, AUDIT_MAX_LIMIT);
    let entries = match query.user_id {
        Some(user_id) => state.audit.for_user(user_id, limit).await,
        None => state.audit.recent(limit).await,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok(entries)))
}

/// GET /api/admin/audit/stats
pub async fn audit_stats(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::AuditLog, Action::Read)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(state.audit.stats().await)))
}

/// GET /api/admin/permissions
pub async fn permissions(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::AuditLog, Action::Read)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::role_grants(state.authorizer.matrix()))))
}
