//! Authentication extractor.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use fellowship_core::domain::{ApprovalStatus, Role};
use fellowship_core::ports::{AuthError, BaseRepository};
use fellowship_shared::ErrorResponse;

use crate::middleware::error::AppError;
use crate::state::AppState;

/// Authenticated, approved user.
///
/// The token only proves who the caller is; role and approval status are
/// read from the user store on every request, so a rejection or role
/// change takes effect immediately.
/// ```ignore
/// async fn protected_route(identity: Identity) -> impl Responder {
///     format!("Hello, {}!", identity.display_name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

/// Error type for authentication failures.
#[derive(Debug)]
pub struct AuthenticationError(pub AuthError);

impl std::fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl actix_web::ResponseError for AuthenticationError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match &self.0 {
            AuthError::InsufficientPermissions => actix_web::http::StatusCode::FORBIDDEN,
            AuthError::HashingError(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            _ => actix_web::http::StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        let error = match &self.0 {
            AuthError::TokenExpired => ErrorResponse::new(401, "Token Expired")
                .with_detail("Your authentication token has expired. Please login again."),
            AuthError::InvalidToken(msg) => {
                ErrorResponse::new(401, "Invalid Token").with_detail(msg.clone())
            }
            AuthError::MissingAuth => ErrorResponse::new(401, "Authentication Required")
                .with_detail("Please provide a valid Bearer token in the Authorization header."),
            AuthError::InvalidCredentials => ErrorResponse::unauthorized(),
            AuthError::InsufficientPermissions => {
                ErrorResponse::forbidden().with_detail("Your account is not approved.")
            }
            AuthError::HashingError(_) => ErrorResponse::internal_error(),
        };

        actix_web::HttpResponse::build(self.status_code()).json(error)
    }
}

/// Bearer token from the `Authorization` header. Browsers cannot set
/// headers on `EventSource`, so the notification stream also accepts an
/// `access_token` query parameter.
fn bearer_token(req: &HttpRequest) -> Result<String, AuthError> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidToken("Invalid authorization header".to_string()))?;
        return value
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .ok_or_else(|| AuthError::InvalidToken("Expected Bearer token".to_string()));
    }

    if req.path().ends_with("/notifications/stream") {
        let query = web::Query::<std::collections::HashMap<String, String>>::from_query(
            req.query_string(),
        )
        .map_err(|_| AuthError::MissingAuth)?;
        if let Some(token) = query.get("access_token") {
            return Ok(token.clone());
        }
    }

    Err(AuthError::MissingAuth)
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let Some(state) = state else {
                tracing::error!("AppState not found in app data");
                return Err(AppError::Internal("Server configuration error".into()).into());
            };

            let claims = token
                .and_then(|t| state.tokens.validate_token(&t))
                .map_err(AuthenticationError)?;

            let user = state
                .users
                .find_by_id(claims.user_id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| {
                    AuthenticationError(AuthError::InvalidToken("Unknown user".to_string()))
                })?;

            if user.status != ApprovalStatus::Approved {
                return Err(AuthenticationError(AuthError::InsufficientPermissions).into());
            }

            Ok(Identity {
                user_id: user.id,
                email: user.email,
                display_name: user.display_name,
                role: user.role,
            })
        })
    }
}
