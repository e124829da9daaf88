//! Export settings and the parsing that turns raw flag values into them.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::ConfigError;

/// Environment variable consulted when no token flag is given.
pub const TOKEN_ENV_VAR: &str = "FB_ACCESS_TOKEN";

/// The Graph API refuses larger `limit` values on feed and comment edges.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Timestamp layout the Graph API uses for `created_time`.
pub(crate) const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Bearer credential. Never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Pick the token from the command-line flag, falling back to the
    /// environment value. Blank values count as missing.
    pub fn resolve(flag: Option<String>, env: Option<String>) -> Result<Self, ConfigError> {
        flag.into_iter()
            .chain(env)
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .map(AccessToken)
            .ok_or(ConfigError::MissingToken)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Parse a `--since`/`--until` value.
///
/// Accepts unix seconds, RFC 3339, the Graph API's own `+0000` layout, a
/// naive `YYYY-MM-DDTHH:MM:SS` (read as UTC) or a bare `YYYY-MM-DD`
/// (UTC midnight).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    let value = raw.trim();
    let invalid = || ConfigError::InvalidTimestamp(raw.to_string());

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = value.parse().map_err(|_| invalid())?;
        return DateTime::from_timestamp(secs, 0).ok_or_else(invalid);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, GRAPH_TIME_FORMAT) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(invalid);
    }

    Err(invalid())
}

/// Parse a `created_time` as returned by the Graph API.
pub(crate) fn parse_created_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, GRAPH_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Inclusive window on post creation time. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Self, ConfigError> {
        if let (Some(s), Some(u)) = (since, until) {
            if s > u {
                return Err(ConfigError::EmptyRange {
                    since: s.to_rfc3339(),
                    until: u.to_rfc3339(),
                });
            }
        }
        Ok(Self { since, until })
    }

    /// Build a range straight from the raw flag strings.
    pub fn parse(since: Option<&str>, until: Option<&str>) -> Result<Self, ConfigError> {
        let since = since.map(parse_timestamp).transpose()?;
        let until = until.map(parse_timestamp).transpose()?;
        Self::new(since, until)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| at >= s) && self.until.map_or(true, |u| at <= u)
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

/// Order in which the Graph API returns a post's comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentOrder {
    #[default]
    Chronological,
    ReverseChronological,
}

impl CommentOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentOrder::Chronological => "chronological",
            CommentOrder::ReverseChronological => "reverse_chronological",
        }
    }
}

/// What to export and how to page through it.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub group_id: String,
    pub range: DateRange,
    /// Stop after this many posts have been exported.
    pub max_posts: Option<u64>,
    /// `limit` sent with every feed and comment request.
    pub page_size: u32,
    pub comment_order: CommentOrder,
}

impl ExportConfig {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into().trim().to_string(),
            range: DateRange::default(),
            max_posts: None,
            page_size: MAX_PAGE_SIZE,
            comment_order: CommentOrder::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::MissingGroupId);
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                got: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(())
    }
}
