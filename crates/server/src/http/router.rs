use super::handlers::{comments, posts, reviews};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const METHODS: [Method; 3] = [Method::GET, Method::POST, Method::DELETE];

pub fn build_router(state: AppState, allowed_origins: &str) -> Router {
    let cors = if allowed_origins == "*" {
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_origin(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("CORS config is invalid or empty, falling back to allow ANY.");
            CorsLayer::new()
                .allow_methods(METHODS)
                .allow_origin(Any)
                .allow_headers(Any)
        } else {
            tracing::info!("CORS enabled for origins: {:?}", origins);
            CorsLayer::new()
                .allow_methods(METHODS)
                .allow_origin(origins)
                .allow_headers(Any)
        }
    };

    Router::new()
        .route(
            "/api/forum/posts/",
            get(posts::list_posts).post(posts::create_post),
        )
        .route("/api/forum/posts/:id", get(posts::get_post))
        .route("/api/forum/posts/:id/like", post(posts::toggle_like))
        .route(
            "/api/forum/comments/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/api/forum/comments/:id", delete(comments::delete_comment))
        .route("/api/forum/comments/:id/like", post(comments::toggle_like))
        .route("/api/reviews/", get(reviews::list_reviews))
        .route("/api/reviews/:id/like", post(reviews::toggle_review_like))
        .route(
            "/api/replies/",
            get(reviews::list_replies).post(reviews::create_reply),
        )
        .route("/api/replies/:id/like", post(reviews::toggle_reply_like))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
