//! Domain entities - the core business objects.

mod chat;
mod comment;
mod event;
mod notification;
mod post;
mod user;

pub use chat::{ChatMessage, ChatRole, CHAT_MESSAGE_MAX};
pub use comment::Comment;
pub use event::{AttendOutcome, Event, EventDraft};
pub use notification::{Notification, NotificationKind, NotificationSettings};
pub use post::{Post, PostCategory, PostDraft};
pub use user::{ApprovalStatus, Role, User};

use crate::error::DomainError;

/// Character-count bounds check on a user supplied field.
pub(crate) fn check_length(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), DomainError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DomainError::validation(if min > 0 && len < min {
            format!("{field} must not be empty")
        } else {
            format!("{field} must be at most {max} characters")
        }));
    }
    Ok(())
}
