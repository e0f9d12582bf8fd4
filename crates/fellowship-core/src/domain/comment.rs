use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::check_length;
use crate::error::DomainError;

pub const COMMENT_MAX: usize = 1000;

/// Comment entity - a reply under a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        post_id: Uuid,
        author_id: Uuid,
        author_name: String,
        content: &str,
    ) -> Result<Self, DomainError> {
        let content = Self::validate_content(content)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            author_name,
            content,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn edit(&mut self, content: &str) -> Result<(), DomainError> {
        self.content = Self::validate_content(content)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn validate_content(content: &str) -> Result<String, DomainError> {
        let content = content.trim();
        check_length("content", content, 1, COMMENT_MAX)?;
        Ok(content.to_string())
    }
}
