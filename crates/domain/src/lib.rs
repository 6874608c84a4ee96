mod commands;
mod error;
mod models;
pub mod protocol;
pub mod reducer;

pub use commands::{NewComment, NewPost, NewReviewReply};
pub use error::{CoreError, EntityKind};
pub use models::{Author, Comment, CourseReview, Identified, Post, ReviewReply};
pub use protocol::{Page, PageRequest};
