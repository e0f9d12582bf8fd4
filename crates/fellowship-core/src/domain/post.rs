use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::check_length;
use crate::error::DomainError;

pub const TITLE_MAX: usize = 100;
pub const CONTENT_MAX: usize = 5000;
pub const IMAGES_MAX: usize = 5;

/// Board a post is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    Notice,
    #[default]
    Free,
    Prayer,
    Testimony,
}

impl PostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::Notice => "notice",
            PostCategory::Free => "free",
            PostCategory::Prayer => "prayer",
            PostCategory::Testimony => "testimony",
        }
    }

    /// Notices are announcements and need moderation rights to publish.
    pub fn is_restricted(&self) -> bool {
        matches!(self, PostCategory::Notice)
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "notice" => Ok(PostCategory::Notice),
            "free" => Ok(PostCategory::Free),
            "prayer" => Ok(PostCategory::Prayer),
            "testimony" => Ok(PostCategory::Testimony),
            other => Err(DomainError::validation(format!("unknown category '{other}'"))),
        }
    }
}

/// User-editable part of a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub category: PostCategory,
    pub title: String,
    pub content: String,
    pub image_urls: Vec<String>,
}

impl PostDraft {
    /// Trim and validate; returns the normalized draft.
    pub fn validated(mut self) -> Result<Self, DomainError> {
        self.title = self.title.trim().to_string();
        check_length("title", &self.title, 1, TITLE_MAX)?;
        check_length("content", self.content.trim(), 1, CONTENT_MAX)?;
        if self.image_urls.len() > IMAGES_MAX {
            return Err(DomainError::validation(format!(
                "at most {IMAGES_MAX} images per post"
            )));
        }
        if self.image_urls.iter().any(|u| u.trim().is_empty()) {
            return Err(DomainError::validation("image url must not be empty"));
        }
        Ok(self)
    }
}

impl From<&Post> for PostDraft {
    fn from(post: &Post) -> Self {
        Self {
            category: post.category,
            title: post.title.clone(),
            content: post.content.clone(),
            image_urls: post.image_urls.clone(),
        }
    }
}

/// Post entity - a bulletin board entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub category: PostCategory,
    pub title: String,
    pub content: String,
    pub image_urls: Vec<String>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post from a validated draft.
    pub fn new(author_id: Uuid, author_name: String, draft: PostDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id,
            author_name,
            category: draft.category,
            title: draft.title,
            content: draft.content,
            image_urls: draft.image_urls,
            view_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields with a validated draft.
    pub fn revise(&mut self, draft: PostDraft) {
        self.category = draft.category;
        self.title = draft.title;
        self.content = draft.content;
        self.image_urls = draft.image_urls;
        self.updated_at = Utc::now();
    }
}
