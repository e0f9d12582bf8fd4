//! Role based access control.
//!
//! A static matrix maps each [`Role`] to the (resource, action) pairs it may
//! perform. Ownership is folded in through [`PermissionMatrix::can_modify`]:
//! the author of a record needs the plain action, anyone else needs the
//! moderation right on that resource.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Post,
    Comment,
    Event,
    Notification,
    User,
    AuditLog,
    Chat,
    Upload,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Post,
        Resource::Comment,
        Resource::Event,
        Resource::Notification,
        Resource::User,
        Resource::AuditLog,
        Resource::Chat,
        Resource::Upload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Post => "post",
            Resource::Comment => "comment",
            Resource::Event => "event",
            Resource::Notification => "notification",
            Resource::User => "user",
            Resource::AuditLog => "audit_log",
            Resource::Chat => "chat",
            Resource::Upload => "upload",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Attend,
    /// Act on records owned by someone else.
    Moderate,
    /// Administrative control (approval, role changes).
    Manage,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Attend,
        Action::Moderate,
        Action::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Attend => "attend",
            Action::Moderate => "moderate",
            Action::Manage => "manage",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Grant = (Resource, Action);

const MEMBER_GRANTS: &[Grant] = &[
    (Resource::Post, Action::Read),
    (Resource::Post, Action::Create),
    (Resource::Post, Action::Update),
    (Resource::Post, Action::Delete),
    (Resource::Comment, Action::Read),
    (Resource::Comment, Action::Create),
    (Resource::Comment, Action::Update),
    (Resource::Comment, Action::Delete),
    (Resource::Event, Action::Read),
    (Resource::Event, Action::Attend),
    (Resource::Notification, Action::Read),
    (Resource::Notification, Action::Update),
    (Resource::Notification, Action::Delete),
    (Resource::Chat, Action::Create),
    (Resource::Upload, Action::Create),
];

const LEADER_GRANTS: &[Grant] = &[
    (Resource::Post, Action::Moderate),
    (Resource::Comment, Action::Moderate),
    (Resource::Event, Action::Create),
    (Resource::Event, Action::Update),
    (Resource::Event, Action::Delete),
    (Resource::Event, Action::Moderate),
    (Resource::User, Action::Read),
];

/// Role → allowed (resource, action) lookup table.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    grants: HashMap<Role, HashSet<Grant>>,
}

impl PermissionMatrix {
    /// The community's standard table: leaders extend members, admins hold
    /// every grant.
    pub fn standard() -> Self {
        let member: HashSet<Grant> = MEMBER_GRANTS.iter().copied().collect();
        let leader: HashSet<Grant> = member
            .iter()
            .copied()
            .chain(LEADER_GRANTS.iter().copied())
            .collect();
        let admin: HashSet<Grant> = Resource::ALL
            .iter()
            .flat_map(|r| Action::ALL.iter().map(move |a| (*r, *a)))
            .collect();

        let mut grants = HashMap::new();
        grants.insert(Role::Member, member);
        grants.insert(Role::Leader, leader);
        grants.insert(Role::Admin, admin);
        Self { grants }
    }

    pub fn allows(&self, role: Role, resource: Resource, action: Action) -> bool {
        self.grants
            .get(&role)
            .map(|set| set.contains(&(resource, action)))
            .unwrap_or(false)
    }

    /// Ownership-aware check for update/delete style actions on a record.
    pub fn can_modify(
        &self,
        role: Role,
        actor: Uuid,
        owner: Uuid,
        resource: Resource,
        action: Action,
    ) -> bool {
        if actor == owner {
            return self.allows(role, resource, action);
        }
        let elevated = match resource {
            Resource::User => Action::Manage,
            _ => Action::Moderate,
        };
        self.allows(role, resource, elevated)
    }

    /// Sorted grant list for a role.
    pub fn grants(&self, role: Role) -> Vec<Grant> {
        let mut list: Vec<Grant> = self
            .grants
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        list.sort();
        list
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}
