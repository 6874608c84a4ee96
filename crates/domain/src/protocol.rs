use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use url::Url;

pub const POSTS_PATH: &str = "/api/forum/posts/";
pub const COMMENTS_PATH: &str = "/api/forum/comments/";
pub const REVIEWS_PATH: &str = "/api/reviews/";
pub const REPLIES_PATH: &str = "/api/replies/";

/// Paginated list envelope: `{ count, next, previous, results }`.
///
/// `next` and `previous` are absolute URLs on the wire; clients keep only the
/// path and query (see [`to_cursor`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn last(results: Vec<T>) -> Self {
        Self {
            count: results.len() as u64,
            next: None,
            previous: None,
            results,
        }
    }
}

impl<T: for<'de> Deserialize<'de>> Page<T> {
    /// Missing envelope fields surface as `MalformedResponse`.
    pub fn from_json(body: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(body).map_err(|e| CoreError::MalformedResponse(e.to_string()))
    }
}

/// Body of a comment delete response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

/// 1-based page number + size, as the list endpoints take them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn has_next(&self, total: u64) -> bool {
        self.offset() + u64::from(self.page_size) < total
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Reduces a `next`/`previous` link to a relative `path?query` cursor.
///
/// Already-relative links are kept as they are. `None` means the feed is
/// exhausted.
pub fn to_cursor(link: Option<&str>) -> Result<Option<String>, CoreError> {
    let link = match link.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(l) => l,
    };

    if link.starts_with('/') {
        return Ok(Some(link.to_string()));
    }

    let url = Url::parse(link)
        .map_err(|e| CoreError::MalformedResponse(format!("bad page link {:?}: {}", link, e)))?;

    let cursor = match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    };
    Ok(Some(cursor))
}
