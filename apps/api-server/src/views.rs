//! Domain to wire conversions.

use fellowship_core::PermissionMatrix;
use fellowship_core::domain::{
    ChatMessage, ChatRole, Comment, Event, Notification, NotificationSettings, Post, Role, User,
};
use fellowship_shared::dto::{
    ChatMessageDto, CommentResponse, EventResponse, GrantDto, NotificationResponse,
    NotificationSettingsDto, PostResponse, RoleGrants, UserResponse,
};

pub fn user(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        role: user.role.to_string(),
        status: user.status.to_string(),
        created_at: user.created_at,
    }
}

/// Counters are looked up by the caller.
pub struct PostCounts {
    pub likes: u64,
    pub comments: u64,
    pub liked_by_me: bool,
}

pub fn post(post: Post, counts: PostCounts) -> PostResponse {
    PostResponse {
        id: post.id,
        author_id: post.author_id,
        author_name: post.author_name,
        category: post.category.to_string(),
        title: post.title,
        content: post.content,
        image_urls: post.image_urls,
        view_count: post.view_count,
        like_count: counts.likes,
        comment_count: counts.comments,
        liked_by_me: counts.liked_by_me,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

pub fn comment(comment: Comment) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        post_id: comment.post_id,
        author_id: comment.author_id,
        author_name: comment.author_name,
        content: comment.content,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    }
}

pub fn event(event: Event, attending: bool) -> EventResponse {
    EventResponse {
        id: event.id,
        title: event.title,
        description: event.description,
        location: event.location,
        latitude: event.latitude,
        longitude: event.longitude,
        starts_at: event.starts_at,
        ends_at: event.ends_at,
        max_attendees: event.max_attendees,
        attendee_count: event.attendee_count,
        attending,
        created_by: event.created_by,
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

pub fn notification(n: &Notification) -> NotificationResponse {
    NotificationResponse {
        id: n.id,
        kind: n.kind.to_string(),
        title: n.title.clone(),
        message: n.message.clone(),
        link: n.link.clone(),
        read: n.read,
        created_at: n.created_at,
    }
}

pub fn settings(s: &NotificationSettings) -> NotificationSettingsDto {
    NotificationSettingsDto {
        email_enabled: s.email_enabled,
        comments: s.comments,
        likes: s.likes,
        events: s.events,
        reminders: s.reminders,
    }
}

pub fn chat_message(m: &ChatMessage) -> ChatMessageDto {
    let role = match m.role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    };
    ChatMessageDto {
        role: role.to_string(),
        content: m.content.clone(),
        created_at: m.created_at,
    }
}

pub fn role_grants(matrix: &PermissionMatrix) -> Vec<RoleGrants> {
    Role::ALL
        .iter()
        .map(|role| RoleGrants {
            role: role.to_string(),
            grants: matrix
                .grants(*role)
                .into_iter()
                .map(|(resource, action)| GrantDto {
                    resource: resource.to_string(),
                    action: action.to_string(),
                })
                .collect(),
        })
        .collect()
}
