use chrono::Utc;
use domain::{reducer, CoreError, CourseReview, EntityKind, NewReviewReply, ReviewReply};
use std::collections::HashSet;
use tracing::debug;

use crate::ids;

/// Course reviews and their single layer of replies.
#[derive(Debug, Clone, Default)]
pub struct ReviewReplyStore {
    reviews: Vec<CourseReview>,
    replies: Vec<ReviewReply>,
}

impl ReviewReplyStore {
    pub fn new(reviews: Vec<CourseReview>, replies: Vec<ReviewReply>) -> Self {
        let mut store = Self::default();
        store.import(reviews, replies);
        store
    }

    pub fn review(&self, review_id: &str) -> Option<&CourseReview> {
        self.reviews.iter().find(|r| r.id == review_id)
    }

    /// Newest first. `None` lists every subject.
    pub fn list_reviews(&self, subject_id: Option<&str>) -> Vec<CourseReview> {
        let mut reviews: Vec<CourseReview> = self
            .reviews
            .iter()
            .filter(|r| subject_id.map_or(true, |s| r.subject_id == s))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews
    }

    /// Ascending by creation time.
    pub fn list_replies(&self, review_id: Option<&str>) -> Vec<ReviewReply> {
        let mut replies: Vec<ReviewReply> = self
            .replies
            .iter()
            .filter(|r| review_id.map_or(true, |id| r.review_id == id))
            .cloned()
            .collect();
        replies.sort_by_key(|r| r.created_at);
        replies
    }

    pub fn add_reply(&mut self, draft: NewReviewReply) -> Result<ReviewReply, CoreError> {
        let review = self
            .reviews
            .iter_mut()
            .find(|r| r.id == draft.review_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Review, &draft.review_id))?;
        reducer::apply_reply_delta(review, 1);

        let reply = draft.into_reply(ids::generate(), Utc::now());
        self.replies.push(reply.clone());
        Ok(reply)
    }

    pub fn toggle_review_like(&mut self, review_id: &str) -> Result<CourseReview, CoreError> {
        let review = self
            .reviews
            .iter_mut()
            .find(|r| r.id == review_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Review, review_id))?;
        reducer::apply_toggle_like(review);
        Ok(review.clone())
    }

    pub fn toggle_reply_like(&mut self, reply_id: &str) -> Result<ReviewReply, CoreError> {
        let reply = self
            .replies
            .iter_mut()
            .find(|r| r.id == reply_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Reply, reply_id))?;
        reducer::apply_toggle_like(reply);
        Ok(reply.clone())
    }

    /// Bulk merge keeping ids and timestamps. Known ids and replies to
    /// unknown reviews are skipped; `replies_count` follows the stored replies.
    pub fn import(&mut self, reviews: Vec<CourseReview>, replies: Vec<ReviewReply>) {
        let mut known: HashSet<String> = self.reviews.iter().map(|r| r.id.clone()).collect();
        for review in reviews {
            if known.insert(review.id.clone()) {
                self.reviews.push(review);
            }
        }

        let mut seen: HashSet<String> = self.replies.iter().map(|r| r.id.clone()).collect();
        for reply in replies {
            if !known.contains(&reply.review_id) {
                debug!("Skipping reply {} to unknown review {}", reply.id, reply.review_id);
                continue;
            }
            if seen.insert(reply.id.clone()) {
                self.replies.push(reply);
            }
        }

        for review in self.reviews.iter_mut() {
            review.replies_count =
                self.replies.iter().filter(|r| r.review_id == review.id).count() as u32;
        }
    }
}
