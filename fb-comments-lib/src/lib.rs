//! Export the comments on a Facebook group's posts to CSV.
//!
//! This library handles:
//! - Resolving the access token and export settings
//! - Paging through a group feed and each post's comments via the Graph API
//! - Flattening (post, comment) pairs into CSV rows
//!
//! ```no_run
//! use fb_comments_lib::{export_comments, AccessToken, CommentWriter, ExportConfig, GraphClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let token = AccessToken::resolve(None, std::env::var("FB_ACCESS_TOKEN").ok())?;
//! let client = GraphClient::new(token, "v19.0")?;
//! let mut sink = CommentWriter::new(std::io::stdout())?;
//! let summary = export_comments(&client, &ExportConfig::new("123456789"), &mut sink, |_| {}).await?;
//! eprintln!("{} comments", summary.comments);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod export;
mod graph;
mod row;

pub use config::{
    parse_timestamp, AccessToken, CommentOrder, DateRange, ExportConfig, MAX_PAGE_SIZE,
    TOKEN_ENV_VAR,
};
pub use error::{ConfigError, GraphError};
pub use export::{export_comments, ExportSummary, ProgressEvent};
pub use graph::{
    default_base_url, Author, Comment, GraphClient, Paginator, Post, DEFAULT_API_VERSION,
    GRAPH_HOST,
};
pub use row::{CommentRow, CommentWriter, CSV_HEADERS};
