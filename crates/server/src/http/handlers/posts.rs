use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::{protocol, NewPost, Page, PageRequest, Post};
use serde::Deserialize;
use storage::PostQuery;
use url::form_urlencoded;

use super::{reject, Rejection};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListPostsParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> Result<Json<Page<Post>>, Rejection> {
    let page_size = params
        .page_size
        .unwrap_or(state.feed.page_size)
        .clamp(1, state.feed.max_page_size.max(1));
    let request = PageRequest::new(params.page.unwrap_or(1), page_size);
    let search = params
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let query = PostQuery {
        page: request,
        search: search.clone(),
    };
    let (results, count) = state.posts.list_posts(&query).await.map_err(reject)?;

    let link = |page: u32| page_link(&state.public_base_url, page, page_size, search.as_deref());
    Ok(Json(Page {
        count,
        next: request.has_next(count).then(|| link(request.page + 1)),
        previous: request.has_previous().then(|| link(request.page - 1)),
        results,
    }))
}

/// Absolute link to one page of the post list.
fn page_link(base_url: &str, page: u32, page_size: u32, search: Option<&str>) -> String {
    let mut link = format!(
        "{}{}?page={}&page_size={}",
        base_url,
        protocol::POSTS_PATH,
        page,
        page_size
    );
    if let Some(term) = search {
        link.push_str("&search=");
        link.extend(form_urlencoded::byte_serialize(term.as_bytes()));
    }
    link
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, Rejection> {
    state.posts.get_post(&post_id).await.map(Json).map_err(reject)
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(draft): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), Rejection> {
    if draft.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Post content is empty".to_string()));
    }
    let post = state.posts.create_post(draft).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, Rejection> {
    state
        .posts
        .toggle_post_like(&post_id)
        .await
        .map(Json)
        .map_err(reject)
}
