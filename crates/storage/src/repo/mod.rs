mod comments;
mod posts;
mod reviews;
