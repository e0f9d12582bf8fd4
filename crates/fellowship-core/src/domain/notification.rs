use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Comment,
    Like,
    Event,
    Reminder,
    Approval,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Comment => "comment",
            NotificationKind::Like => "like",
            NotificationKind::Event => "event",
            NotificationKind::Reminder => "reminder",
            NotificationKind::Approval => "approval",
            NotificationKind::System => "system",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(NotificationKind::Comment),
            "like" => Ok(NotificationKind::Like),
            "event" => Ok(NotificationKind::Event),
            "reminder" => Ok(NotificationKind::Reminder),
            "approval" => Ok(NotificationKind::Approval),
            "system" => Ok(NotificationKind::System),
            other => Err(DomainError::validation(format!(
                "unknown notification kind '{other}'"
            ))),
        }
    }
}

/// Notification entity - an in-app message for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            link,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Per-user delivery preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub user_id: Uuid,
    pub email_enabled: bool,
    pub comments: bool,
    pub likes: bool,
    pub events: bool,
    pub reminders: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSettings {
    /// Defaults for a user who never saved settings.
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_enabled: false,
            comments: true,
            likes: true,
            events: true,
            reminders: true,
            updated_at: Utc::now(),
        }
    }

    /// Approval and system messages cannot be muted.
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Comment => self.comments,
            NotificationKind::Like => self.likes,
            NotificationKind::Event => self.events,
            NotificationKind::Reminder => self.reminders,
            NotificationKind::Approval | NotificationKind::System => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = NotificationSettings::defaults_for(Uuid::new_v4());
        assert!(!s.email_enabled);
        assert!(s.allows(NotificationKind::Comment));
        assert!(s.allows(NotificationKind::Reminder));
    }

    #[test]
    fn test_muted_kinds() {
        let mut s = NotificationSettings::defaults_for(Uuid::new_v4());
        s.likes = false;
        s.comments = false;
        assert!(!s.allows(NotificationKind::Like));
        assert!(!s.allows(NotificationKind::Comment));
        assert!(s.allows(NotificationKind::Approval));
        assert!(s.allows(NotificationKind::System));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("reminder".parse::<NotificationKind>().unwrap(), NotificationKind::Reminder);
        assert!("spam".parse::<NotificationKind>().is_err());
    }
}
