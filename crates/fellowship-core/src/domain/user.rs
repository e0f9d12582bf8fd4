use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::check_length;
use crate::error::DomainError;

pub const DISPLAY_NAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 8;

/// User category gating feature access, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Leader,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Member, Role::Leader, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Leader => "leader",
            Role::Admin => "admin",
        }
    }

    /// Highest role named in a token's role list; unknown strings are ignored.
    pub fn highest<S: AsRef<str>>(roles: &[S]) -> Option<Role> {
        roles.iter().filter_map(|r| r.as_ref().parse().ok()).max()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "leader" => Ok(Role::Leader),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Admin approval state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(DomainError::validation(format!(
                "unknown approval status '{other}'"
            ))),
        }
    }
}

/// User entity - a registered community member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new pending member with generated ID and timestamps.
    pub fn new(email: String, display_name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            password_hash,
            role: Role::Member,
            status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bootstrap administrator: approved on creation.
    pub fn new_admin(email: String, display_name: String, password_hash: String) -> Self {
        Self {
            role: Role::Admin,
            status: ApprovalStatus::Approved,
            ..Self::new(email, display_name, password_hash)
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    pub fn set_status(&mut self, status: ApprovalStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.updated_at = Utc::now();
    }

    /// Validate registration input before the password is hashed.
    pub fn validate_registration(
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<(), DomainError> {
        let email = email.trim();
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !valid_email {
            return Err(DomainError::validation("Invalid email address"));
        }
        check_length("display_name", display_name.trim(), 1, DISPLAY_NAME_MAX)?;
        if password.chars().count() < PASSWORD_MIN {
            return Err(DomainError::validation(format!(
                "Password must be at least {PASSWORD_MIN} characters"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering_and_highest() {
        assert!(Role::Admin > Role::Leader);
        assert!(Role::Leader > Role::Member);
        assert_eq!(Role::highest(&["member", "admin"]), Some(Role::Admin));
        assert_eq!(Role::highest(&["bogus"]), None);
    }

    #[test]
    fn test_role_parse_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_user_is_pending_member() {
        let user = User::new("a@b.org".into(), "Ana".into(), "hash".into());
        assert_eq!(user.role, Role::Member);
        assert!(!user.is_approved());

        let admin = User::new_admin("root@b.org".into(), "Root".into(), "hash".into());
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_approved());
    }

    #[test]
    fn test_validate_registration() {
        assert!(User::validate_registration("a@b.org", "Ana", "password1").is_ok());
        assert!(User::validate_registration("not-an-email", "Ana", "password1").is_err());
        assert!(User::validate_registration("a@b.org", "  ", "password1").is_err());
        assert!(User::validate_registration("a@b.org", "Ana", "short").is_err());
        let long_name = "x".repeat(DISPLAY_NAME_MAX + 1);
        assert!(User::validate_registration("a@b.org", &long_name, "password1").is_err());
    }
}
