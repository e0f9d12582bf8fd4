//! Permission checks with audit recording.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fellowship_core::ports::{AuditEntry, AuditLog};
use fellowship_core::{Action, PermissionMatrix, Resource};

use crate::config::AuditPolicy;
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};

/// Every handler goes through here for permission decisions; each decision
/// lands in the audit log.
#[derive(Clone)]
pub struct Authorizer {
    matrix: Arc<PermissionMatrix>,
    audit: Arc<dyn AuditLog>,
    policy: AuditPolicy,
}

impl Authorizer {
    pub fn new(matrix: Arc<PermissionMatrix>, audit: Arc<dyn AuditLog>, policy: AuditPolicy) -> Self {
        Self {
            matrix,
            audit,
            policy,
        }
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    /// Require a plain grant.
    pub async fn require(
        &self,
        who: &Identity,
        resource: Resource,
        action: Action,
    ) -> AppResult<()> {
        let allowed = self.matrix.allows(who.role, resource, action);
        self.decide(who, resource, action, allowed, None).await
    }

    /// Require `action` on a record owned by `owner`; non-owners need the
    /// elevated right for the resource.
    pub async fn require_owner_or_moderator(
        &self,
        who: &Identity,
        owner: Uuid,
        resource: Resource,
        action: Action,
        target: Uuid,
    ) -> AppResult<()> {
        let allowed = self
            .matrix
            .can_modify(who.role, who.user_id, owner, resource, action);
        self.decide(who, resource, action, allowed, Some(target)).await
    }

    async fn decide(
        &self,
        who: &Identity,
        resource: Resource,
        action: Action,
        allowed: bool,
        target: Option<Uuid>,
    ) -> AppResult<()> {
        let mut entry = AuditEntry::new(Some(who.user_id), Some(who.role), resource, action, allowed);
        if let Some(target) = target {
            entry = entry.with_target(target);
        }
        self.audit.record(entry).await;

        if allowed {
            return Ok(());
        }

        self.flag_denial_burst(who).await;
        Err(AppError::Forbidden(format!(
            "{} may not {} {}",
            who.role, action, resource
        )))
    }

    /// Warn when `who` has been denied more than the threshold within the
    /// window. Returns whether the warning fired.
    async fn flag_denial_burst(&self, who: &Identity) -> bool {
        // A window reaching past the calendar counts every denial.
        let since = chrono::Duration::from_std(self.policy.denial_window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let denials = self.audit.denied_since(who.user_id, since).await;
        if denials <= self.policy.denial_threshold {
            return false;
        }

        tracing::warn!(
            user_id = %who.user_id,
            role = %who.role,
            denials,
            window_secs = self.policy.denial_window.as_secs(),
            "Repeated permission denials"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fellowship_core::domain::Role;
    use fellowship_infra::InMemoryAuditLog;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "a@x.org".into(),
            display_name: "A".into(),
            role,
        }
    }

    fn authorizer() -> (Authorizer, Arc<InMemoryAuditLog>) {
        authorizer_with(AuditPolicy::default())
    }

    fn authorizer_with(policy: AuditPolicy) -> (Authorizer, Arc<InMemoryAuditLog>) {
        let audit = Arc::new(InMemoryAuditLog::new(50));
        let authz = Authorizer::new(Arc::new(PermissionMatrix::standard()), audit.clone(), policy);
        (authz, audit)
    }

    #[tokio::test]
    async fn test_decisions_are_audited() {
        let (authz, audit) = authorizer();
        let member = identity(Role::Member);

        assert!(authz.require(&member, Resource::Post, Action::Create).await.is_ok());
        let denied = authz.require(&member, Resource::Event, Action::Create).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let entries = audit.recent(10).await;
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].allowed);
        assert_eq!(entries[0].resource, Resource::Event);
    }

    #[tokio::test]
    async fn test_owner_and_moderator() {
        let (authz, audit) = authorizer();
        let member = identity(Role::Member);
        let leader = identity(Role::Leader);
        let post_id = Uuid::new_v4();

        authz
            .require_owner_or_moderator(&member, member.user_id, Resource::Post, Action::Delete, post_id)
            .await
            .unwrap();
        assert!(
            authz
                .require_owner_or_moderator(&member, leader.user_id, Resource::Post, Action::Delete, post_id)
                .await
                .is_err()
        );
        authz
            .require_owner_or_moderator(&leader, member.user_id, Resource::Post, Action::Delete, post_id)
            .await
            .unwrap();

        assert_eq!(audit.recent(1).await[0].target, Some(post_id));
    }

    #[tokio::test]
    async fn test_denial_burst_crosses_threshold() {
        let (authz, audit) = authorizer_with(AuditPolicy {
            denial_threshold: 2,
            ..AuditPolicy::default()
        });
        let member = identity(Role::Member);
        let bystander = identity(Role::Member);

        for _ in 0..2 {
            let denied = authz.require(&member, Resource::AuditLog, Action::Read).await;
            assert!(matches!(denied, Err(AppError::Forbidden(_))));
        }
        assert!(!authz.flag_denial_burst(&member).await);

        let denied = authz.require(&member, Resource::AuditLog, Action::Read).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
        assert!(authz.flag_denial_burst(&member).await);
        assert!(!authz.flag_denial_burst(&bystander).await);

        let since = Utc::now() - chrono::Duration::minutes(1);
        assert_eq!(audit.denied_since(member.user_id, since).await, 3);
    }

    #[tokio::test]
    async fn test_oversized_denial_window() {
        for secs in [10_000_000_000_000, u64::MAX] {
            let (authz, _) = authorizer_with(AuditPolicy {
                denial_threshold: 0,
                denial_window: std::time::Duration::from_secs(secs),
                ..AuditPolicy::default()
            });
            let member = identity(Role::Member);

            let denied = authz.require(&member, Resource::Event, Action::Create).await;
            assert!(matches!(denied, Err(AppError::Forbidden(_))));
            assert!(authz.flag_denial_burst(&member).await);
        }
    }
}
