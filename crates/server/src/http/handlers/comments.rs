use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::{protocol::Deleted, Comment, NewComment};
use serde::Deserialize;
use storage::CommentFilter;

use super::{reject, Rejection};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsParams {
    pub post_id: Option<String>,
    pub parent_id: Option<String>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(params): Query<ListCommentsParams>,
) -> Result<Json<Vec<Comment>>, Rejection> {
    let filter = CommentFilter {
        post_id: params.post_id,
        parent_id: params.parent_id,
    };
    state
        .comments
        .list_comments(&filter)
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn create_comment(
    State(state): State<AppState>,
    Json(draft): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), Rejection> {
    if draft.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Comment content is empty".to_string()));
    }
    let comment = state.comments.create_comment(draft).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<Json<Comment>, Rejection> {
    state
        .comments
        .toggle_comment_like(&comment_id)
        .await
        .map(Json)
        .map_err(reject)
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<Json<Deleted>, Rejection> {
    let deleted = state
        .comments
        .delete_comment(&comment_id)
        .await
        .map_err(reject)?;
    Ok(Json(Deleted { deleted }))
}
