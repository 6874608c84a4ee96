//! Client-side state for the forum: thread projection, feed pagination and
//! the post-detail facade.

pub mod feed;
pub mod thread;
pub mod trigger;
pub mod view;

pub use feed::{FetchOutcome, PageSource, PaginationController, SkipReason};
pub use thread::{
    assemble, sort_main_comments, ListMode, Replies, ReplyVisibility, ThreadGroup, ThreadSettings,
    ThreadState, ThreadView,
};
pub use trigger::{run_triggers, FeedTrigger, TriggerPolicy};
pub use view::PostDetailView;
