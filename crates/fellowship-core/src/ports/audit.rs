//! Permission audit port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;
use crate::permissions::{Action, Resource};

/// One recorded permission decision or security-relevant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
    pub resource: Resource,
    pub action: Action,
    pub allowed: bool,
    pub target: Option<Uuid>,
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(
        user_id: Option<Uuid>,
        role: Option<Role>,
        resource: Resource,
        action: Action,
        allowed: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            user_id,
            role,
            resource,
            action,
            allowed,
            target: None,
            detail: None,
        }
    }

    pub fn with_target(mut self, target: Uuid) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    /// Entries currently retained.
    pub retained: usize,
    pub capacity: usize,
    /// Entries ever recorded, including evicted ones.
    pub total_recorded: u64,
    pub retained_denied: usize,
}

/// Bounded log of permission decisions.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry);

    /// Newest first.
    async fn recent(&self, limit: usize) -> Vec<AuditEntry>;

    /// Newest first, one user only.
    async fn for_user(&self, user_id: Uuid, limit: usize) -> Vec<AuditEntry>;

    /// Entries recorded for `user_id` at or after `since`.
    async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> usize;

    /// Denied entries recorded for `user_id` at or after `since`.
    async fn denied_since(&self, user_id: Uuid, since: DateTime<Utc>) -> usize;

    async fn stats(&self) -> AuditStats;
}
