//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use fellowship_core::ports::{JobQueue, QueueStats};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<QueueStats>,
}

/// Health check endpoint - returns server status.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = match &state.db {
        Some(db) => {
            if db.ping().await {
                "up"
            } else {
                "down"
            }
        }
        None => "in-memory",
    };
    let jobs = state.jobs.stats().await.ok();

    let response = HealthResponse {
        status: if database == "down" { "degraded" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
        jobs,
    };

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{self, test_app};
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_reports_in_memory_mode() {
        let state = testing::state();
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "in-memory");
        assert_eq!(body["jobs"]["pending"], 0);
    }

    #[actix_web::test]
    async fn test_unknown_route_is_problem_json() {
        let state = testing::state();
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/api/nope").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 404);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["instance"], "/api/nope");
    }
}
