use anyhow::Context;
use std::sync::Arc;
use storage::{seed, CommentRepository, Db, MemoryForum, PostRepository, ReviewRepository};
use tracing::info;

use crate::config::{FeedSettings, Settings};

#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub feed: FeedSettings,
    pub public_base_url: String,
}

impl AppState {
    /// Opens the configured backend and seeds it when asked to.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let state = if settings.database.is_memory() {
            info!("Using in-memory storage");
            Self::with_backend(Arc::new(MemoryForum::new()), settings)
        } else {
            let db = Db::new(&settings.database.url)
                .await
                .context("Failed to open database")?;
            Self::with_backend(Arc::new(db), settings)
        };

        if settings.database.seed_demo {
            seed::seed_demo_data(state.posts.as_ref(), state.comments.as_ref())
                .await
                .context("Failed to seed demo data")?;
            seed::seed_demo_reviews(state.reviews.as_ref())
                .await
                .context("Failed to seed demo reviews")?;
        }

        Ok(state)
    }

    fn with_backend<B>(backend: Arc<B>, settings: &Settings) -> Self
    where
        B: PostRepository + CommentRepository + ReviewRepository + 'static,
    {
        Self {
            posts: backend.clone(),
            comments: backend.clone(),
            reviews: backend,
            feed: settings.feed,
            public_base_url: settings.server.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}
