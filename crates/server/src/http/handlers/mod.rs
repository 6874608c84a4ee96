use axum::http::StatusCode;
use domain::CoreError;

pub mod comments;
pub mod posts;
pub mod reviews;

pub type Rejection = (StatusCode, String);

pub fn reject(e: CoreError) -> Rejection {
    let status = match &e {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::AlreadyExists { .. } => StatusCode::CONFLICT,
        CoreError::NetworkFailure(_) | CoreError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    } else {
        tracing::debug!("Request rejected: {}", e);
    }
    (status, e.to_string())
}
