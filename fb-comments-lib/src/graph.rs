//! Minimal Graph API client: authenticated GETs plus cursor pagination over
//! the two edges the export needs (`/{group}/feed` and `/{post}/comments`).

use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::{AccessToken, CommentOrder, DateRange};
use crate::error::{ConfigError, GraphError};

pub const GRAPH_HOST: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v19.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const FEED_FIELDS: &str = "id,message,created_time";
const COMMENT_FIELDS: &str = "id,message,created_time,from,like_count,comment_count";

// ============================================================================
// API Response Types
// ============================================================================

/// A post from a group feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
}

/// A top-level comment on a post.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    /// Missing when the author's profile isn't visible to the token.
    #[serde(default)]
    pub from: Option<Author>,
    #[serde(default)]
    pub like_count: Option<u64>,
    /// Number of replies.
    #[serde(default)]
    pub comment_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Author {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    // Not plain `default`, which would demand `T: Default`.
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

impl<T> Page<T> {
    fn next_link(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|next| !next.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull `error.message` out of a failed response, falling back to the raw body.
fn api_error_message(body: &str, status: reqwest::StatusCode) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("empty response")
            .to_string(),
        Err(_) => body.to_string(),
    }
}

// ============================================================================
// Client
// ============================================================================

pub fn default_base_url(api_version: &str) -> String {
    format!("{}/{}", GRAPH_HOST, api_version.trim_matches('/'))
}

/// Authenticated handle on one Graph API base URL.
pub struct GraphClient {
    http: reqwest::Client,
    base: Url,
    token: AccessToken,
}

impl GraphClient {
    /// Client for the public Graph API at the given version.
    pub fn new(token: AccessToken, api_version: &str) -> Result<Self> {
        Self::with_base_url(token, &default_base_url(api_version))
    }

    /// Client for an arbitrary base URL, e.g. `http://127.0.0.1:8080/v19.0`.
    pub fn with_base_url(token: AccessToken, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidBaseUrl(base_url.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base, token })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    fn edge_url(&self, node: &str, edge: &str) -> String {
        format!("{}/{}/{}", self.base_url(), urlencoding::encode(node), edge)
    }

    /// Page through a group's feed, newest first as the API returns it.
    ///
    /// `since`/`until` are forwarded as unix seconds so the server can
    /// narrow the feed; callers still have to check each post themselves.
    pub fn feed(&self, group_id: &str, range: &DateRange, limit: u32) -> Paginator<'_, Post> {
        let mut params = vec![
            ("fields", FEED_FIELDS.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(since) = range.since {
            params.push(("since", since.timestamp().to_string()));
        }
        if let Some(until) = range.until {
            params.push(("until", until.timestamp().to_string()));
        }

        Paginator::new(self, self.edge_url(group_id, "feed"), params)
    }

    /// Page through the top-level comments of one post.
    pub fn comments(&self, post_id: &str, order: CommentOrder, limit: u32) -> Paginator<'_, Comment> {
        let params = vec![
            ("fields", COMMENT_FIELDS.to_string()),
            ("limit", limit.to_string()),
            ("order", order.as_str().to_string()),
        ];

        Paginator::new(self, self.edge_url(post_id, "comments"), params)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GraphError> {
        let response = request.bearer_auth(self.token.secret()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GraphError::Api {
                status: status.as_u16(),
                message: api_error_message(&body, status),
            });
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(source) => Err(GraphError::InvalidJson { body, source }),
        }
    }

    /// Only follow `paging.next` links that stay on our own origin, so the
    /// bearer token never leaves it.
    fn follow(&self, next: &str) -> Result<Url, GraphError> {
        match Url::parse(next) {
            Ok(url) if url.origin() == self.base.origin() => Ok(url),
            _ => Err(GraphError::ForeignCursor(next.to_string())),
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

enum Cursor {
    Start {
        url: String,
        params: Vec<(&'static str, String)>,
    },
    Next(Url),
    /// The last page pointed somewhere we won't send the token.
    Refused(String),
    Done,
}

/// Walks one edge page by page until `paging.next` runs out.
pub struct Paginator<'a, T> {
    client: &'a GraphClient,
    cursor: Cursor,
    pages: usize,
    _item: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> Paginator<'a, T> {
    fn new(client: &'a GraphClient, url: String, params: Vec<(&'static str, String)>) -> Self {
        Self {
            client,
            cursor: Cursor::Start { url, params },
            pages: 0,
            _item: PhantomData,
        }
    }

    /// Fetch the next page. Returns `None` once the previous page had no
    /// `paging.next`; no request is made in that case.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, GraphError> {
        let request = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return Ok(None),
            Cursor::Refused(next) => return Err(GraphError::ForeignCursor(next)),
            Cursor::Start { url, params } => {
                debug!(%url, "Fetching first page");
                self.client.http.get(url).query(&params)
            }
            Cursor::Next(url) => {
                debug!(page = self.pages + 1, "Following paging.next");
                self.client.http.get(url)
            }
        };

        let page: Page<T> = self.client.get_json(request).await?;
        self.pages += 1;

        // Hand back the data we already have; a bad link only fails the
        // following call.
        if let Some(next) = page.next_link() {
            self.cursor = match self.client.follow(next) {
                Ok(url) => Cursor::Next(url),
                Err(_) => Cursor::Refused(next.to_string()),
            };
        }

        Ok(Some(page.data))
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GraphClient {
        let token = AccessToken::resolve(Some("token".to_string()), None).unwrap();
        GraphClient::with_base_url(token, base).unwrap()
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(default_base_url("v19.0"), "https://graph.facebook.com/v19.0");
        assert_eq!(default_base_url("/v20.0/"), "https://graph.facebook.com/v20.0");
    }

    #[test]
    fn test_edge_url_encodes_node() {
        let client = client("https://graph.facebook.com/v19.0/");
        assert_eq!(
            client.edge_url("123_456", "comments"),
            "https://graph.facebook.com/v19.0/123_456/comments"
        );
        assert_eq!(
            client.edge_url("a/b", "feed"),
            "https://graph.facebook.com/v19.0/a%2Fb/feed"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let token = AccessToken::resolve(Some("token".to_string()), None).unwrap();
        let err = GraphClient::with_base_url(token, "not a url").err().unwrap();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidBaseUrl("not a url".to_string()))
        );
    }

    #[test]
    fn test_follow_same_origin_only() {
        let client = client("https://graph.facebook.com/v19.0");
        assert!(client
            .follow("https://graph.facebook.com/v19.0/1/feed?after=abc")
            .is_ok());
        assert!(matches!(
            client.follow("https://evil.example.com/v19.0/1/feed"),
            Err(GraphError::ForeignCursor(_))
        ));
        assert!(matches!(
            client.follow("http://graph.facebook.com/v19.0/1/feed"),
            Err(GraphError::ForeignCursor(_))
        ));
    }

    #[test]
    fn test_api_error_message() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;
        assert_eq!(api_error_message(body, status), "Invalid OAuth access token.");
        assert_eq!(api_error_message("<html>oops</html>", status), "<html>oops</html>");
        assert_eq!(api_error_message("", status), "Bad Request");
    }

    #[test]
    fn test_page_next_link() {
        let page: Page<Post> = serde_json::from_str(
            r#"{"data":[{"id":"1"}],"paging":{"cursors":{"after":"x"},"next":"https://graph.facebook.com/next"}}"#,
        )
        .unwrap();
        assert_eq!(page.next_link(), Some("https://graph.facebook.com/next"));

        let last: Page<Post> =
            serde_json::from_str(r#"{"data":[],"paging":{"cursors":{"before":"x"}}}"#).unwrap();
        assert_eq!(last.next_link(), None);

        let bare: Page<Post> = serde_json::from_str("{}").unwrap();
        assert!(bare.data.is_empty());
        assert_eq!(bare.next_link(), None);
    }

    #[test]
    fn test_page_of_items_without_default() {
        #[derive(Debug, Deserialize)]
        struct Reaction {
            kind: String,
        }

        let page: Page<Reaction> =
            serde_json::from_str(r#"{"data":[{"kind":"LIKE"}]}"#).unwrap();
        assert_eq!(page.data[0].kind, "LIKE");

        let empty: Page<Reaction> = serde_json::from_str(r#"{"paging":{}}"#).unwrap();
        assert!(empty.data.is_empty());
    }

    #[test]
    fn test_comment_tolerates_missing_fields() {
        let comment: Comment =
            serde_json::from_str(r#"{"id":"c1","from":null,"like_count":null}"#).unwrap();
        assert_eq!(comment.id, "c1");
        assert_eq!(comment.from, None);
        assert_eq!(comment.like_count, None);
        assert_eq!(comment.comment_count, None);
    }
}
