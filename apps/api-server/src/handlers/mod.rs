//! HTTP handlers and route configuration.

mod admin;
mod auth;
mod chat;
mod comments;
mod events;
mod health;
mod notifications;
mod posts;
mod uploads;

#[cfg(test)]
pub(crate) mod testing;

use actix_web::web;
use serde::Deserialize;

use fellowship_core::PageRequest;

/// `?offset&limit` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.offset, self.limit)
    }
}

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/uploads/{name}", web::get().to(uploads::serve))
        .service(
            web::scope("/api")
                // Public routes
                .route("/health", web::get().to(health::health_check))
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .route("/me", web::get().to(auth::me)),
                )
                // Board
                .service(
                    web::scope("/posts")
                        .route("", web::get().to(posts::list))
                        .route("", web::post().to(posts::create))
                        .route("/{id}", web::get().to(posts::get))
                        .route("/{id}", web::put().to(posts::update))
                        .route("/{id}", web::delete().to(posts::delete))
                        .route("/{id}/comments", web::get().to(comments::list))
                        .route("/{id}/comments", web::post().to(comments::create))
                        .route("/{id}/like", web::post().to(posts::like))
                        .route("/{id}/like", web::delete().to(posts::unlike)),
                )
                .service(
                    web::scope("/comments")
                        .route("/{id}", web::put().to(comments::update))
                        .route("/{id}", web::delete().to(comments::delete)),
                )
                // Calendar
                .service(
                    web::scope("/events")
                        .route("", web::get().to(events::list))
                        .route("", web::post().to(events::create))
                        .route("/{id}", web::get().to(events::get))
                        .route("/{id}", web::put().to(events::update))
                        .route("/{id}", web::delete().to(events::delete))
                        .route("/{id}/attendance", web::post().to(events::attend))
                        .route("/{id}/attendance", web::delete().to(events::cancel))
                        .route("/{id}/attendees", web::get().to(events::attendees)),
                )
                // Fixed paths first; `/{id}` would shadow them.
                .service(
                    web::scope("/notifications")
                        .route("", web::get().to(notifications::list))
                        .route("/unread-count", web::get().to(notifications::unread_count))
                        .route("/read-all", web::post().to(notifications::read_all))
                        .route("/settings", web::get().to(notifications::get_settings))
                        .route("/settings", web::put().to(notifications::update_settings))
                        .route("/stream", web::get().to(notifications::stream))
                        .route("/{id}/read", web::post().to(notifications::mark_read))
                        .route("/{id}", web::delete().to(notifications::delete)),
                )
                .service(
                    web::scope("/chat")
                        .route("", web::post().to(chat::send))
                        .route("/history", web::get().to(chat::history))
                        .route("/history", web::delete().to(chat::clear)),
                )
                .route("/uploads", web::post().to(uploads::upload))
                .service(
                    web::scope("/admin")
                        .route("/users", web::get().to(admin::list_users))
                        .route("/users/{id}/approve", web::post().to(admin::approve))
                        .route("/users/{id}/reject", web::post().to(admin::reject))
                        .route("/users/{id}/role", web::put().to(admin::set_role))
                        .route("/audit", web::get().to(admin::audit))
                        .route("/audit/stats", web::get().to(admin::audit_stats))
                        .route("/permissions", web::get().to(admin::permissions)),
                ),
        );
}
