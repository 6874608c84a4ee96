use crate::models::{Author, Comment, Post, ReviewReply};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Payload for creating a comment. `parent_id` may name any comment of the
/// post; the store resolves it to the owning main comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: String,
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub reply_to_user: Option<Author>,
}

impl NewComment {
    pub fn into_comment(self, id: String, created_at: DateTime<Utc>) -> Comment {
        Comment {
            id,
            content: self.content,
            author: self.author,
            created_at,
            likes: 0,
            is_liked: Some(false),
            parent_id: self.parent_id,
            post_id: self.post_id,
            is_deleted: false,
            reply_to_user: self.reply_to_user,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub language: String,
}

impl NewPost {
    pub fn into_post(self, id: String, created_at: DateTime<Utc>) -> Post {
        Post {
            id,
            title: self.title,
            content: self.content,
            author: self.author,
            created_at,
            tags: self.tags,
            likes: 0,
            is_liked: Some(false),
            comments_count: 0,
            language: self.language,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReviewReply {
    pub review_id: String,
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub reply_to_user: Option<Author>,
}

impl NewReviewReply {
    pub fn into_reply(self, id: String, created_at: DateTime<Utc>) -> ReviewReply {
        ReviewReply {
            id,
            review_id: self.review_id,
            author: self.author,
            content: self.content,
            created_at,
            likes: 0,
            is_liked: Some(false),
            reply_to_user: self.reply_to_user,
        }
    }
}
