//! Bounded in-memory audit log.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use fellowship_core::ports::{AuditEntry, AuditLog, AuditStats};

pub const DEFAULT_CAPACITY: usize = 1000;

struct Ring {
    entries: VecDeque<AuditEntry>,
    total_recorded: u64,
}

/// Keeps the newest `capacity` entries; the oldest are evicted first.
pub struct InMemoryAuditLog {
    ring: RwLock<Ring>,
    capacity: usize,
}

impl InMemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: RwLock::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                total_recorded: 0,
            }),
            capacity,
        }
    }

    async fn count_where<F>(&self, user_id: Uuid, since: DateTime<Utc>, extra: F) -> usize
    where
        F: Fn(&AuditEntry) -> bool,
    {
        let ring = self.ring.read().await;
        // Timestamps are taken before the lock, so the ring is only roughly
        // in time order.
        ring.entries
            .iter()
            .filter(|e| e.user_id == Some(user_id) && e.at >= since && extra(e))
            .count()
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) {
        if !entry.allowed {
            tracing::info!(
                user_id = ?entry.user_id,
                resource = %entry.resource,
                action = %entry.action,
                target = ?entry.target,
                "Permission denied"
            );
        }

        let mut ring = self.ring.write().await;
        if ring.entries.len() == self.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(entry);
        ring.total_recorded += 1;
    }

    async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let ring = self.ring.read().await;
        ring.entries.iter().rev().take(limit).cloned().collect()
    }

    async fn for_user(&self, user_id: Uuid, limit: usize) -> Vec<AuditEntry> {
        let ring = self.ring.read().await;
        ring.entries
            .iter()
            .rev()
            .filter(|e| e.user_id == Some(user_id))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> usize {
        self.count_where(user_id, since, |_| true).await
    }

    async fn denied_since(&self, user_id: Uuid, since: DateTime<Utc>) -> usize {
        self.count_where(user_id, since, |e| !e.allowed).await
    }

    async fn stats(&self) -> AuditStats {
        let ring = self.ring.read().await;
        AuditStats {
            retained: ring.entries.len(),
            capacity: self.capacity,
            total_recorded: ring.total_recorded,
            retained_denied: ring.entries.iter().filter(|e| !e.allowed).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fellowship_core::domain::Role;
    use fellowship_core::permissions::{Action, Resource};

    fn entry(user: Uuid, allowed: bool) -> AuditEntry {
        AuditEntry::new(Some(user), Some(Role::Member), Resource::Post, Action::Delete, allowed)
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let log = InMemoryAuditLog::new(3);
        let user = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let e = entry(user, true);
            ids.push(e.id);
            log.record(e).await;
        }

        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 3);
        // Newest first.
        assert_eq!(recent[0].id, ids[4]);
        assert_eq!(recent[2].id, ids[2]);

        let stats = log.stats().await;
        assert_eq!(stats.retained, 3);
        assert_eq!(stats.total_recorded, 5);
    }

    #[tokio::test]
    async fn test_per_user_counts() {
        let log = InMemoryAuditLog::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        log.record(entry(a, false)).await;
        log.record(entry(a, true)).await;
        log.record(entry(a, false)).await;
        log.record(entry(b, false)).await;

        let since = Utc::now() - Duration::minutes(5);
        assert_eq!(log.count_since(a, since).await, 3);
        assert_eq!(log.denied_since(a, since).await, 2);
        assert_eq!(log.denied_since(b, since).await, 1);
        assert_eq!(log.for_user(a, 2).await.len(), 2);
        assert_eq!(log.stats().await.retained_denied, 3);
    }

    #[tokio::test]
    async fn test_window_excludes_older_entries() {
        let log = InMemoryAuditLog::default();
        let user = Uuid::new_v4();
        let mut old = entry(user, false);
        old.at = Utc::now() - Duration::hours(2);
        log.record(old).await;
        log.record(entry(user, false)).await;

        let since = Utc::now() - Duration::minutes(10);
        assert_eq!(log.denied_since(user, since).await, 1);
    }

    #[tokio::test]
    async fn test_counts_tolerate_out_of_order_entries() {
        let log = InMemoryAuditLog::default();
        let user = Uuid::new_v4();
        let now = Utc::now();

        let mut first = entry(user, false);
        first.at = now;
        let mut late = entry(user, false);
        late.at = now - Duration::milliseconds(5);
        let mut stale = entry(user, false);
        stale.at = now - Duration::hours(1);

        // A slower writer appends an earlier timestamp after a newer one.
        log.record(first).await;
        log.record(stale).await;
        log.record(late).await;

        let since = now - Duration::seconds(1);
        assert_eq!(log.denied_since(user, since).await, 2);
        assert_eq!(log.count_since(user, since).await, 2);
    }
}
