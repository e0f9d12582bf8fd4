//! Shared fixtures for handler tests.

use actix_web::http::header;
use uuid::Uuid;

use fellowship_core::domain::{ApprovalStatus, Role, User};
use fellowship_core::ports::BaseRepository;

use crate::config::AppConfig;
use crate::state::AppState;

pub const ADMIN_EMAIL: &str = "pastor@church.org";

/// Service under test with the full route table.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state.clone()))
                .configure(crate::handlers::configure_routes)
                .default_service(actix_web::web::to(crate::middleware::error::not_found)),
        )
        .await
    };
}
pub(crate) use test_app;

pub fn state() -> AppState {
    AppState::in_memory(AppConfig {
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        upload_dir: std::env::temp_dir().join(format!("fellowship-test-{}", Uuid::new_v4())),
        ..AppConfig::default()
    })
}

/// An approved user with `role` and a valid token.
pub async fn user(state: &AppState, name: &str, role: Role) -> (User, String) {
    let mut user = User::new(
        format!("{}@church.org", name.to_lowercase()),
        name.to_string(),
        "unused-hash".to_string(),
    );
    user.set_status(ApprovalStatus::Approved);
    user.set_role(role);
    let user = state.users.save(user).await.unwrap();
    let token = state
        .tokens
        .generate_token(user.id, &user.email, vec![role.to_string()])
        .unwrap();
    (user, token)
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}
