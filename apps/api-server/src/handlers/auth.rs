//! Authentication handlers.

use actix_web::{HttpResponse, web};

use fellowship_core::domain::{ApprovalStatus, User};
use fellowship_core::ports::{BaseRepository, UserRepository};
use fellowship_infra::email::mask_email;
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::{AuthResponse, LoginRequest, RegisterUserRequest};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// POST /api/auth/register
///
/// New accounts wait for approval unless the address is a configured admin.
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let email = normalize_email(&req.email);
    User::validate_registration(&email, &req.display_name, &req.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = state.passwords.hash(&req.password)?;
    let display_name = req.display_name.trim().to_string();
    let user = if state.config.is_admin_email(&email) {
        User::new_admin(email, display_name, password_hash)
    } else {
        User::new(email, display_name, password_hash)
    };
    let saved = state.users.save(user).await?;

    tracing::info!(
        user_id = %saved.id,
        email = %mask_email(&saved.email),
        role = %saved.role,
        "User registered"
    );

    let message = if saved.is_approved() {
        "Account created"
    } else {
        "Account created and awaiting approval"
    };
    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(views::user(&saved), message)))
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let email = normalize_email(&req.email);

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !state.passwords.verify(&req.password, &user.password_hash)? {
        tracing::debug!(email = %mask_email(&email), "Login failed");
        return Err(AppError::Unauthorized);
    }

    match user.status {
        ApprovalStatus::Approved => {}
        ApprovalStatus::Pending => {
            return Err(AppError::Forbidden("Account is awaiting approval".to_string()));
        }
        ApprovalStatus::Rejected => {
            return Err(AppError::Forbidden("Account registration was rejected".to_string()));
        }
    }

    let token = state
        .tokens
        .generate_token(user.id, &user.email, vec![user.role.to_string()])?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(AuthResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.expiration_seconds().max(0) as u64,
    })))
}

/// GET /api/auth/me
pub async fn me(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(views::user(&user))))
}
