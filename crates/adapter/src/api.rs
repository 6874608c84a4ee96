use anyhow::Context;
use domain::{protocol, CoreError, EntityKind};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Scheme, host and port of the forum backend, e.g. `http://127.0.0.1:3000`.
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the forum REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.base_url))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Relative cursor of the first feed page.
    pub fn feed_start(page_size: u32, search: Option<&str>) -> String {
        let mut cursor = format!("{}?page=1&page_size={}", protocol::POSTS_PATH, page_size);
        if let Some(term) = search.filter(|t| !t.is_empty()) {
            let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
            cursor.push_str("&search=");
            cursor.push_str(&encoded);
        }
        cursor
    }

    /// Joins a relative cursor or API path onto the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, CoreError> {
        self.base_url
            .join(path)
            .map_err(|e| CoreError::MalformedResponse(format!("bad path {:?}: {}", path, e)))
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url)
    }

    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.http.post(url)
    }

    pub(crate) fn delete(&self, url: Url) -> RequestBuilder {
        self.http.delete(url)
    }

    /// Sends the request and decodes a JSON body. A 404 becomes `NotFound`
    /// for `(kind, id)`.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: EntityKind,
        id: &str,
    ) -> Result<T, CoreError> {
        let response = request.send().await.map_err(|e| {
            warn!("Request failed: {}", e);
            CoreError::NetworkFailure(e.to_string())
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| CoreError::NetworkFailure(e.to_string()))?;
        debug!("Response {} ({} bytes)", status, body.len());
        decode(status, &body, kind, id)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
    kind: EntityKind,
    id: &str,
) -> Result<T, CoreError> {
    if status == StatusCode::NOT_FOUND {
        return Err(CoreError::not_found(kind, id));
    }
    if status == StatusCode::CONFLICT {
        return Err(CoreError::already_exists(kind, id));
    }
    if !status.is_success() {
        let text = String::from_utf8_lossy(body);
        return Err(CoreError::NetworkFailure(format!("{}: {}", status, text.trim())));
    }
    serde_json::from_slice(body).map_err(|e| CoreError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Page;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(ApiConfig::new(base)).unwrap()
    }

    #[test]
    fn cursor_is_joined_onto_the_host() {
        let api = client("http://127.0.0.1:3000");
        let url = api.resolve("/api/forum/posts/?page=2&page_size=10").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:3000/api/forum/posts/?page=2&page_size=10"
        );
    }

    #[test]
    fn feed_start_encodes_the_search_term() {
        assert_eq!(
            ApiClient::feed_start(10, None),
            "/api/forum/posts/?page=1&page_size=10"
        );
        assert_eq!(
            ApiClient::feed_start(5, Some("c++ tips")),
            "/api/forum/posts/?page=1&page_size=5&search=c%2B%2B+tips"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(ApiClient::new(ApiConfig::new("not a url")).is_err());
    }

    #[test]
    fn status_codes_map_to_the_error_taxonomy() {
        let missing: Result<Page<serde_json::Value>, _> =
            decode(StatusCode::NOT_FOUND, b"", EntityKind::Post, "p9");
        assert_eq!(missing.unwrap_err(), CoreError::not_found(EntityKind::Post, "p9"));

        let taken: Result<Page<serde_json::Value>, _> =
            decode(StatusCode::CONFLICT, b"", EntityKind::Comment, "c1");
        assert_eq!(taken.unwrap_err(), CoreError::already_exists(EntityKind::Comment, "c1"));

        let down: Result<Page<serde_json::Value>, _> = decode(
            StatusCode::BAD_GATEWAY,
            b"upstream timeout",
            EntityKind::Post,
            "",
        );
        match down.unwrap_err() {
            CoreError::NetworkFailure(msg) => assert!(msg.contains("upstream timeout")),
            other => panic!("expected network failure, got {:?}", other),
        }
    }

    #[test]
    fn bad_body_is_malformed() {
        let garbled: Result<Page<serde_json::Value>, _> =
            decode(StatusCode::OK, b"<html>", EntityKind::Post, "");
        assert!(matches!(garbled.unwrap_err(), CoreError::MalformedResponse(_)));

        let ok: Page<serde_json::Value> = decode(
            StatusCode::OK,
            br#"{"count":1,"next":null,"previous":null,"results":[{}]}"#,
            EntityKind::Post,
            "",
        )
        .unwrap();
        assert_eq!(ok.results.len(), 1);
    }
}
