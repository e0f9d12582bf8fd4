//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use fellowship_infra::auth::JwtConfig;
use fellowship_infra::database::DatabaseConfig;
use fellowship_infra::jobs::InMemoryJobQueueConfig;
use fellowship_infra::rate_limit::RateLimitConfig;

/// When to flag a user for repeated permission denials.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    pub capacity: usize,
    pub denial_threshold: usize,
    pub denial_window: Duration,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            capacity: fellowship_infra::audit::DEFAULT_CAPACITY,
            denial_threshold: 10,
            denial_window: Duration::from_secs(300),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub jobs: InMemoryJobQueueConfig,
    pub audit: AuditPolicy,
    /// Registrations from these addresses become approved admins.
    pub admin_emails: Vec<String>,
    /// A viewer re-opening a post within this window does not add a view.
    pub view_dedup: Duration,
    pub upload_dir: PathBuf,
    pub email_webhook_url: Option<String>,
    pub assistant_webhook_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: None,
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            jobs: InMemoryJobQueueConfig::default(),
            audit: AuditPolicy::default(),
            admin_emails: Vec::new(),
            view_dedup: Duration::from_secs(30 * 60),
            upload_dir: PathBuf::from("./uploads"),
            email_webhook_url: None,
            assistant_webhook_url: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Split a comma separated list of addresses, lowercased.
fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let audit_defaults = AuditPolicy::default();

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            jobs: InMemoryJobQueueConfig::from_env(),
            audit: AuditPolicy {
                capacity: env_parse("AUDIT_LOG_CAPACITY").unwrap_or(audit_defaults.capacity),
                denial_threshold: env_parse("AUDIT_DENIAL_THRESHOLD")
                    .unwrap_or(audit_defaults.denial_threshold),
                denial_window: env_parse("AUDIT_DENIAL_WINDOW_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(audit_defaults.denial_window),
            },
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),
            view_dedup: env_parse("VIEW_DEDUP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.view_dedup),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            email_webhook_url: non_empty("EMAIL_WEBHOOK_URL"),
            assistant_webhook_url: non_empty("ASSISTANT_WEBHOOK_URL"),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_list() {
        assert_eq!(
            parse_email_list(" Pastor@Church.org, ,leader@church.org "),
            vec!["pastor@church.org", "leader@church.org"]
        );
        assert!(parse_email_list("").is_empty());
    }

    #[test]
    fn test_admin_email_match_ignores_case() {
        let config = AppConfig {
            admin_emails: vec!["pastor@church.org".into()],
            ..AppConfig::default()
        };
        assert!(config.is_admin_email("PASTOR@church.org"));
        assert!(!config.is_admin_email("someone@church.org"));
    }
}
