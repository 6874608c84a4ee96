use async_trait::async_trait;
use client::PageSource;
use domain::{
    protocol::{self, Deleted},
    Comment, CoreError, CourseReview, EntityKind, NewComment, NewPost, NewReviewReply, Page, Post,
    ReviewReply,
};
use storage::{CommentFilter, CommentRepository, PostQuery, PostRepository, ReviewRepository};
use tracing::info;
use url::Url;

use crate::api::ApiClient;

impl ApiClient {
    fn posts_url(&self, query: &PostQuery) -> Result<Url, CoreError> {
        let mut url = self.resolve(protocol::POSTS_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.page.to_string())
                .append_pair("page_size", &query.page.page_size.to_string());
            if let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) {
                pairs.append_pair("search", term);
            }
        }
        Ok(url)
    }

    fn comments_url(&self, filter: &CommentFilter) -> Result<Url, CoreError> {
        let mut url = self.resolve(protocol::COMMENTS_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(post_id) = &filter.post_id {
                pairs.append_pair("postId", post_id);
            }
            if let Some(parent_id) = &filter.parent_id {
                pairs.append_pair("parentId", parent_id);
            }
        }
        Ok(url)
    }

    fn filtered_url(&self, path: &str, key: &str, value: Option<&str>) -> Result<Url, CoreError> {
        let mut url = self.resolve(path)?;
        if let Some(value) = value {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }

    fn item_url(&self, collection: &str, id: &str, action: Option<&str>) -> Result<Url, CoreError> {
        let path = match action {
            Some(action) => format!("{}{}/{}", collection, id, action),
            None => format!("{}{}", collection, id),
        };
        self.resolve(&path)
    }
}

#[async_trait]
impl PageSource<Post> for ApiClient {
    async fn fetch_page(&self, cursor: &str) -> Result<Page<Post>, CoreError> {
        let url = self.resolve(cursor)?;
        self.send(self.get(url), EntityKind::Post, cursor).await
    }
}

#[async_trait]
impl PostRepository for ApiClient {
    async fn list_posts(&self, query: &PostQuery) -> Result<(Vec<Post>, u64), CoreError> {
        let url = self.posts_url(query)?;
        let page: Page<Post> = self.send(self.get(url), EntityKind::Post, "").await?;
        Ok((page.results, page.count))
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, CoreError> {
        let url = self.item_url(protocol::POSTS_PATH, post_id, None)?;
        self.send(self.get(url), EntityKind::Post, post_id).await
    }

    async fn create_post(&self, draft: NewPost) -> Result<Post, CoreError> {
        let url = self.resolve(protocol::POSTS_PATH)?;
        let post: Post = self
            .send(self.post(url).json(&draft), EntityKind::Post, "")
            .await?;
        info!("Post created remotely: {}", post.id);
        Ok(post)
    }

    async fn toggle_post_like(&self, post_id: &str) -> Result<Post, CoreError> {
        let url = self.item_url(protocol::POSTS_PATH, post_id, Some("like"))?;
        self.send(self.post(url), EntityKind::Post, post_id).await
    }

    async fn import_posts(&self, _posts: Vec<Post>) -> Result<(), CoreError> {
        Err(CoreError::Storage(
            "bulk import is not available over HTTP".to_string(),
        ))
    }
}

#[async_trait]
impl CommentRepository for ApiClient {
    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CoreError> {
        let url = self.comments_url(filter)?;
        let id = filter.post_id.as_deref().unwrap_or_default();
        self.send(self.get(url), EntityKind::Post, id).await
    }

    async fn create_comment(&self, draft: NewComment) -> Result<Comment, CoreError> {
        let url = self.resolve(protocol::COMMENTS_PATH)?;
        // 有回复目标时 404 指向被回复的评论
        let (kind, id) = match &draft.parent_id {
            Some(parent) => (EntityKind::Comment, parent.clone()),
            None => (EntityKind::Post, draft.post_id.clone()),
        };
        self.send(self.post(url).json(&draft), kind, &id).await
    }

    async fn toggle_comment_like(&self, comment_id: &str) -> Result<Comment, CoreError> {
        let url = self.item_url(protocol::COMMENTS_PATH, comment_id, Some("like"))?;
        self.send(self.post(url), EntityKind::Comment, comment_id)
            .await
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<bool, CoreError> {
        let url = self.item_url(protocol::COMMENTS_PATH, comment_id, None)?;
        let body: Deleted = self
            .send(self.delete(url), EntityKind::Comment, comment_id)
            .await?;
        Ok(body.deleted)
    }

    async fn import_comments(&self, _comments: Vec<Comment>) -> Result<(), CoreError> {
        Err(CoreError::Storage(
            "bulk import is not available over HTTP".to_string(),
        ))
    }
}

#[async_trait]
impl ReviewRepository for ApiClient {
    async fn list_reviews(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<CourseReview>, CoreError> {
        let url = self.filtered_url(protocol::REVIEWS_PATH, "course", subject_id)?;
        self.send(self.get(url), EntityKind::Review, "").await
    }

    async fn list_replies(&self, review_id: Option<&str>) -> Result<Vec<ReviewReply>, CoreError> {
        let url = self.filtered_url(protocol::REPLIES_PATH, "review", review_id)?;
        self.send(self.get(url), EntityKind::Review, review_id.unwrap_or_default())
            .await
    }

    async fn create_reply(&self, draft: NewReviewReply) -> Result<ReviewReply, CoreError> {
        let url = self.resolve(protocol::REPLIES_PATH)?;
        let id = draft.review_id.clone();
        self.send(self.post(url).json(&draft), EntityKind::Review, &id)
            .await
    }

    async fn toggle_review_like(&self, review_id: &str) -> Result<CourseReview, CoreError> {
        let url = self.item_url(protocol::REVIEWS_PATH, review_id, Some("like"))?;
        self.send(self.post(url), EntityKind::Review, review_id).await
    }

    async fn toggle_reply_like(&self, reply_id: &str) -> Result<ReviewReply, CoreError> {
        let url = self.item_url(protocol::REPLIES_PATH, reply_id, Some("like"))?;
        self.send(self.post(url), EntityKind::Reply, reply_id).await
    }

    async fn import_reviews(
        &self,
        _reviews: Vec<CourseReview>,
        _replies: Vec<ReviewReply>,
    ) -> Result<(), CoreError> {
        Err(CoreError::Storage(
            "bulk import is not available over HTTP".to_string(),
        ))
    }
}
