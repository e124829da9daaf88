use thiserror::Error;

/// Longest slice of a response body shown in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}... ({} bytes)", &body[..cut], body.len()),
        None => body.to_string(),
    }
}

/// Problems with the caller's settings. All of these are raised before the
/// first request goes out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no access token: pass --access-token or set FB_ACCESS_TOKEN")]
    MissingToken,

    #[error("group id must not be empty")]
    MissingGroupId,

    #[error("invalid timestamp {0:?}: expected unix seconds, RFC 3339 or YYYY-MM-DD")]
    InvalidTimestamp(String),

    #[error("--since ({since}) is later than --until ({until})")]
    EmptyRange { since: String, until: String },

    #[error("page size must be between 1 and {max}, got {got}")]
    InvalidPageSize { got: u32, max: u32 },

    #[error("invalid base URL {0:?}")]
    InvalidBaseUrl(String),
}

/// Failures talking to the Graph API.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Graph API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid JSON from Graph API: {source}: {}", excerpt(.body))]
    InvalidJson {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("refusing to follow pagination link to another host: {0}")]
    ForeignCursor(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
