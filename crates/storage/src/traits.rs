use async_trait::async_trait;
use domain::{
    Comment, CoreError, CourseReview, NewComment, NewPost, NewReviewReply, PageRequest, Post,
    ReviewReply,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub page: PageRequest,
    pub search: Option<String>,
}

impl PostQuery {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page: PageRequest::new(page, page_size),
            search: None,
        }
    }

    pub fn matches(&self, post: &Post) -> bool {
        let Some(term) = self.search.as_deref().map(|s| s.trim().to_lowercase()) else {
            return true;
        };
        if term.is_empty() {
            return true;
        }
        post.title
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains(&term))
            || post.content.to_lowercase().contains(&term)
            || post.tags.iter().any(|t| t.to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub post_id: Option<String>,
    pub parent_id: Option<String>,
}

impl CommentFilter {
    pub fn for_post(post_id: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
            parent_id: None,
        }
    }

    pub fn matches(&self, comment: &Comment) -> bool {
        self.post_id.as_deref().map_or(true, |p| comment.post_id == p)
            && self
                .parent_id
                .as_deref()
                .map_or(true, |p| comment.parent_id.as_deref() == Some(p))
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest first, plus the total number of matching posts.
    async fn list_posts(&self, query: &PostQuery) -> Result<(Vec<Post>, u64), CoreError>;
    async fn get_post(&self, post_id: &str) -> Result<Post, CoreError>;
    async fn create_post(&self, draft: NewPost) -> Result<Post, CoreError>;
    async fn toggle_post_like(&self, post_id: &str) -> Result<Post, CoreError>;
    async fn import_posts(&self, posts: Vec<Post>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Ascending by creation time.
    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CoreError>;
    async fn create_comment(&self, draft: NewComment) -> Result<Comment, CoreError>;
    async fn toggle_comment_like(&self, comment_id: &str) -> Result<Comment, CoreError>;
    /// Soft delete; `false` when there was nothing to delete.
    async fn delete_comment(&self, comment_id: &str) -> Result<bool, CoreError>;
    async fn import_comments(&self, comments: Vec<Comment>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Newest first. `None` lists reviews of every course.
    async fn list_reviews(&self, subject_id: Option<&str>)
        -> Result<Vec<CourseReview>, CoreError>;
    /// Ascending by creation time.
    async fn list_replies(&self, review_id: Option<&str>) -> Result<Vec<ReviewReply>, CoreError>;
    async fn create_reply(&self, draft: NewReviewReply) -> Result<ReviewReply, CoreError>;
    async fn toggle_review_like(&self, review_id: &str) -> Result<CourseReview, CoreError>;
    async fn toggle_reply_like(&self, reply_id: &str) -> Result<ReviewReply, CoreError>;
    async fn import_reviews(
        &self,
        reviews: Vec<CourseReview>,
        replies: Vec<ReviewReply>,
    ) -> Result<(), CoreError>;
}
