use async_trait::async_trait;
use chrono::Utc;
use domain::{
    reducer, Comment, CoreError, CourseReview, EntityKind, NewComment, NewPost, NewReviewReply,
    Post, ReviewReply,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    comment_store::CommentStore,
    ids,
    review_replies::ReviewReplyStore,
    traits::{CommentFilter, CommentRepository, PostQuery, PostRepository, ReviewRepository},
};

/// Process-local forum backend. Posts, comments and course reviews live
/// behind one lock each; comment counts are derived from the comment store
/// on read.
#[derive(Default)]
pub struct MemoryForum {
    posts: RwLock<Vec<Post>>,
    comments: RwLock<CommentStore>,
    reviews: RwLock<ReviewReplyStore>,
}

impl MemoryForum {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_count(store: &CommentStore, mut post: Post) -> Post {
        post.comments_count = store.comments_for_post(&post.id).len() as u32;
        post
    }
}

#[async_trait]
impl PostRepository for MemoryForum {
    async fn list_posts(&self, query: &PostQuery) -> Result<(Vec<Post>, u64), CoreError> {
        let posts = self.posts.read().await;
        let comments = self.comments.read().await;

        let mut matching: Vec<&Post> = posts.iter().filter(|p| query.matches(p)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;

        let page = matching
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.page_size as usize)
            .map(|p| Self::with_count(&comments, p.clone()))
            .collect();

        Ok((page, total))
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, CoreError> {
        let posts = self.posts.read().await;
        let post = posts
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Post, post_id))?;
        Ok(Self::with_count(&*self.comments.read().await, post))
    }

    async fn create_post(&self, draft: NewPost) -> Result<Post, CoreError> {
        let post = draft.into_post(ids::generate(), Utc::now());
        self.posts.write().await.push(post.clone());
        info!("Post created: {}", post.id);
        Ok(post)
    }

    async fn toggle_post_like(&self, post_id: &str) -> Result<Post, CoreError> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Post, post_id))?;
        reducer::apply_toggle_like(post);
        let snapshot = post.clone();
        drop(posts);

        Ok(Self::with_count(&*self.comments.read().await, snapshot))
    }

    async fn import_posts(&self, posts: Vec<Post>) -> Result<(), CoreError> {
        self.posts.write().await.extend(posts);
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for MemoryForum {
    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CoreError> {
        let store = self.comments.read().await;
        let mut comments: Vec<Comment> = store
            .all()
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn create_comment(&self, draft: NewComment) -> Result<Comment, CoreError> {
        if !self.posts.read().await.iter().any(|p| p.id == draft.post_id) {
            return Err(CoreError::not_found(EntityKind::Post, draft.post_id));
        }
        let comment = draft.into_comment(ids::generate(), Utc::now());
        self.comments.write().await.add(comment)
    }

    async fn toggle_comment_like(&self, comment_id: &str) -> Result<Comment, CoreError> {
        self.comments.write().await.toggle_like(comment_id)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<bool, CoreError> {
        Ok(self.comments.write().await.delete(comment_id))
    }

    async fn import_comments(&self, comments: Vec<Comment>) -> Result<(), CoreError> {
        let mut store = self.comments.write().await;
        let mut merged = store.all().to_vec();
        merged.extend(comments);
        *store = CommentStore::load(merged);
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for MemoryForum {
    async fn list_reviews(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<CourseReview>, CoreError> {
        Ok(self.reviews.read().await.list_reviews(subject_id))
    }

    async fn list_replies(&self, review_id: Option<&str>) -> Result<Vec<ReviewReply>, CoreError> {
        Ok(self.reviews.read().await.list_replies(review_id))
    }

    async fn create_reply(&self, draft: NewReviewReply) -> Result<ReviewReply, CoreError> {
        let reply = self.reviews.write().await.add_reply(draft)?;
        info!("Reply created: {} on review {}", reply.id, reply.review_id);
        Ok(reply)
    }

    async fn toggle_review_like(&self, review_id: &str) -> Result<CourseReview, CoreError> {
        self.reviews.write().await.toggle_review_like(review_id)
    }

    async fn toggle_reply_like(&self, reply_id: &str) -> Result<ReviewReply, CoreError> {
        self.reviews.write().await.toggle_reply_like(reply_id)
    }

    async fn import_reviews(
        &self,
        reviews: Vec<CourseReview>,
        replies: Vec<ReviewReply>,
    ) -> Result<(), CoreError> {
        self.reviews.write().await.import(reviews, replies);
        Ok(())
    }
}
