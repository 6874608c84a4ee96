//! Optimistic state transitions shared by posts, comments, reviews and replies.
//!
//! Every transition takes the current entity and returns the next one. Whether
//! a network call wraps the transition is up to the caller.

use crate::models::{Comment, CourseReview, Post, ReviewReply};

pub trait Likeable {
    fn like_state(&self) -> (bool, u32);
    fn set_like_state(&mut self, liked: bool, likes: u32);
}

pub trait ReplyCounted {
    fn reply_count(&self) -> u32;
    fn set_reply_count(&mut self, count: u32);
}

/// Flips the viewer's like and moves the counter by one, never below zero.
pub fn toggle_like<T: Likeable>(mut entity: T) -> T {
    apply_toggle_like(&mut entity);
    entity
}

pub fn apply_toggle_like<T: Likeable + ?Sized>(entity: &mut T) {
    let (liked, likes) = entity.like_state();
    let next_liked = !liked;
    let next_likes = if next_liked {
        likes.saturating_add(1)
    } else {
        likes.saturating_sub(1)
    };
    entity.set_like_state(next_liked, next_likes);
}

pub fn adjust_reply_count<T: ReplyCounted>(mut entity: T, delta: i64) -> T {
    apply_reply_delta(&mut entity, delta);
    entity
}

pub fn apply_reply_delta<T: ReplyCounted + ?Sized>(entity: &mut T, delta: i64) {
    let next = (i64::from(entity.reply_count()) + delta).clamp(0, i64::from(u32::MAX));
    entity.set_reply_count(next as u32);
}

/// 软删除：保留 ID 以维持评论树结构，但清空内容
pub fn soft_delete(mut comment: Comment) -> Comment {
    comment.is_deleted = true;
    comment.content.clear();
    comment
}

macro_rules! likeable {
    ($($ty:ty),*) => {
        $(
            impl Likeable for $ty {
                fn like_state(&self) -> (bool, u32) {
                    (self.is_liked.unwrap_or(false), self.likes)
                }

                fn set_like_state(&mut self, liked: bool, likes: u32) {
                    self.is_liked = Some(liked);
                    self.likes = likes;
                }
            }
        )*
    };
}

likeable!(Comment, Post, CourseReview, ReviewReply);

impl ReplyCounted for Post {
    fn reply_count(&self) -> u32 {
        self.comments_count
    }

    fn set_reply_count(&mut self, count: u32) {
        self.comments_count = count;
    }
}

impl ReplyCounted for CourseReview {
    fn reply_count(&self) -> u32 {
        self.replies_count
    }

    fn set_reply_count(&mut self, count: u32) {
        self.replies_count = count;
    }
}
