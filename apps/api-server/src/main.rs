//! # Fellowship API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

use fellowship_core::ports::JobQueue;

mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;
mod views;

use config::AppConfig;
use middleware::rate_limit::RateLimitMiddleware;
use observability::RequestIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();
    let (host, port) = (config.host.clone(), config.port);

    tracing::info!("Starting Fellowship API Server on {}:{}", host, port);

    let state = AppState::new(config).await;

    if let Err(e) = state
        .jobs
        .start_worker(background::job_handler(
            state.notifier.clone(),
            state.email.clone(),
        ))
        .await
    {
        tracing::error!(error = %e, "Failed to start job workers");
    }

    #[cfg(feature = "scheduler")]
    let mut scheduler = start_scheduler(&state).await;

    let app_state = state.clone();
    let result = HttpServer::new(move || {
        // Last wrap runs first: request ids exist before rate limiting.
        App::new()
            .wrap(RateLimitMiddleware::new(app_state.limiter.clone()))
            .wrap(RequestIdMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(app_state.clone()))
            .configure(handlers::configure_routes)
            .default_service(web::to(middleware::error::not_found))
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    #[cfg(feature = "scheduler")]
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
    }

    tracing::info!("Server stopped");
    result
}

#[cfg(feature = "scheduler")]
async fn start_scheduler(state: &AppState) -> Option<background::scheduler::Scheduler> {
    use background::scheduler::{Scheduler, SchedulerConfig};

    let scheduler = match Scheduler::new(SchedulerConfig::from_env()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create scheduler");
            return None;
        }
    };
    if let Err(e) = scheduler.register_defaults(state).await {
        tracing::error!(error = %e, "Failed to register scheduled jobs");
    }
    if let Err(e) = scheduler.start().await {
        tracing::error!(error = %e, "Failed to start scheduler");
    }
    Some(scheduler)
}
