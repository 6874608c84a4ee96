use chrono::{DateTime, Utc};
use domain::{Author, Comment, CourseReview, Post, ReviewReply};
use sqlx::FromRow;
use tracing::warn;

#[derive(FromRow)]
pub struct SqlPost {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tags: String,
    pub language: String,
    pub likes: i64,
    pub is_liked: bool,

    // 子查询字段
    pub comments_count: i64,
}

impl From<SqlPost> for Post {
    fn from(sql: SqlPost) -> Self {
        let tags = serde_json::from_str(&sql.tags).unwrap_or_else(|e| {
            warn!("Post {} has unreadable tags {:?}: {}", sql.id, sql.tags, e);
            Default::default()
        });

        Post {
            id: sql.id,
            title: sql.title,
            content: sql.content,
            author: Author {
                id: sql.author_id,
                name: sql.author_name,
                avatar: sql.author_avatar,
            },
            created_at: sql.created_at,
            tags,
            likes: to_count(sql.likes),
            is_liked: Some(sql.is_liked),
            comments_count: to_count(sql.comments_count),
            language: sql.language,
        }
    }
}

#[derive(FromRow)]
pub struct SqlComment {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub reply_to_id: Option<String>,
    pub reply_to_name: Option<String>,
    pub reply_to_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub is_liked: bool,
    pub is_deleted: bool,
}

impl From<SqlComment> for Comment {
    fn from(sql: SqlComment) -> Self {
        let reply_to_user = match (sql.reply_to_id, sql.reply_to_name) {
            (Some(id), Some(name)) => Some(Author {
                id,
                name,
                avatar: sql.reply_to_avatar,
            }),
            _ => None,
        };

        Comment {
            id: sql.id,
            content: sql.content,
            author: Author {
                id: sql.author_id,
                name: sql.author_name,
                avatar: sql.author_avatar,
            },
            created_at: sql.created_at,
            likes: to_count(sql.likes),
            is_liked: Some(sql.is_liked),
            parent_id: sql.parent_id,
            post_id: sql.post_id,
            is_deleted: sql.is_deleted,
            reply_to_user,
        }
    }
}

#[derive(FromRow)]
pub struct SqlReview {
    pub id: String,
    pub subject_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub overall_rating: f64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub is_liked: bool,

    // 子查询字段
    pub replies_count: i64,
}

impl From<SqlReview> for CourseReview {
    fn from(sql: SqlReview) -> Self {
        CourseReview {
            id: sql.id,
            subject_id: sql.subject_id,
            author: Author {
                id: sql.author_id,
                name: sql.author_name,
                avatar: sql.author_avatar,
            },
            overall_rating: sql.overall_rating as f32,
            content: sql.content,
            likes: to_count(sql.likes),
            created_at: sql.created_at,
            is_liked: Some(sql.is_liked),
            replies_count: to_count(sql.replies_count),
        }
    }
}

#[derive(FromRow)]
pub struct SqlReviewReply {
    pub id: String,
    pub review_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub reply_to_id: Option<String>,
    pub reply_to_name: Option<String>,
    pub reply_to_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub is_liked: bool,
}

impl From<SqlReviewReply> for ReviewReply {
    fn from(sql: SqlReviewReply) -> Self {
        let reply_to_user = match (sql.reply_to_id, sql.reply_to_name) {
            (Some(id), Some(name)) => Some(Author {
                id,
                name,
                avatar: sql.reply_to_avatar,
            }),
            _ => None,
        };

        ReviewReply {
            id: sql.id,
            review_id: sql.review_id,
            author: Author {
                id: sql.author_id,
                name: sql.author_name,
                avatar: sql.author_avatar,
            },
            content: sql.content,
            created_at: sql.created_at,
            likes: to_count(sql.likes),
            is_liked: Some(sql.is_liked),
            reply_to_user,
        }
    }
}

fn to_count(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}
