pub mod comment;
pub mod event;
pub mod event_attendee;
pub mod notification;
pub mod notification_settings;
pub mod post;
pub mod post_like;
pub mod user;
