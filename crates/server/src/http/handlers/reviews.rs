use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::{CourseReview, NewReviewReply, ReviewReply};
use serde::Deserialize;

use super::{reject, Rejection};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListReviewsParams {
    pub course: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRepliesParams {
    pub review: Option<String>,
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ListReviewsParams>,
) -> Result<Json<Vec<CourseReview>>, Rejection> {
    // 空的 course 参数等同于不过滤
    let course = params.course.as_deref().filter(|c| !c.is_empty());
    state
        .reviews
        .list_reviews(course)
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn toggle_review_like(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
) -> Result<Json<CourseReview>, Rejection> {
    state
        .reviews
        .toggle_review_like(&review_id)
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn list_replies(
    State(state): State<AppState>,
    Query(params): Query<ListRepliesParams>,
) -> Result<Json<Vec<ReviewReply>>, Rejection> {
    let review = params.review.as_deref().filter(|r| !r.is_empty());
    state
        .reviews
        .list_replies(review)
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn create_reply(
    State(state): State<AppState>,
    Json(draft): Json<NewReviewReply>,
) -> Result<(StatusCode, Json<ReviewReply>), Rejection> {
    if draft.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Reply content is empty".to_string()));
    }
    let reply = state.reviews.create_reply(draft).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn toggle_reply_like(
    State(state): State<AppState>,
    Path(reply_id): Path<String>,
) -> Result<Json<ReviewReply>, Rejection> {
    state
        .reviews
        .toggle_reply_like(&reply_id)
        .await
        .map(Json)
        .map_err(reject)
}
