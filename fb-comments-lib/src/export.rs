use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{parse_created_time, DateRange, ExportConfig};
use crate::graph::{GraphClient, Post};
use crate::row::{CommentRow, CommentWriter};

/// Totals for a finished export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Posts whose comments were exported.
    pub posts: u64,
    /// Posts dropped because they fell outside the date range.
    pub skipped_posts: u64,
    /// Rows written.
    pub comments: u64,
}

/// Reported while an export runs, so a front end can show progress.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    PostStarted { post: &'a Post, number: u64 },
    PostSkipped { post: &'a Post },
    CommentsWritten { post: &'a Post, count: u64 },
}

fn in_range(range: &DateRange, post: &Post) -> bool {
    if range.is_unbounded() {
        return true;
    }

    match post.created_time.as_deref().and_then(parse_created_time) {
        Some(created) => range.contains(created),
        None => {
            warn!(
                post_id = %post.id,
                created_time = ?post.created_time,
                "Cannot read post creation time, keeping it"
            );
            true
        }
    }
}

/// Walk the group feed and write one CSV row per comment.
///
/// Feed traversal stops as soon as `max_posts` posts have been exported;
/// posts outside `range` are skipped and don't count toward that cap.
/// Rows are flushed after every page of comments.
pub async fn export_comments<W: Write>(
    client: &GraphClient,
    config: &ExportConfig,
    sink: &mut CommentWriter<W>,
    mut on_progress: impl FnMut(ProgressEvent<'_>),
) -> Result<ExportSummary> {
    config.validate()?;

    let mut summary = ExportSummary::default();
    if config.max_posts == Some(0) {
        sink.flush()?;
        return Ok(summary);
    }

    // No point asking for a bigger first page than we'll use.
    let first_limit = match config.max_posts {
        Some(max) => max.min(u64::from(config.page_size)) as u32,
        None => config.page_size,
    };

    let group_id = config.group_id.trim();
    let mut feed = client.feed(group_id, &config.range, first_limit);

    'feed: while let Some(posts) = feed
        .next_page()
        .await
        .with_context(|| format!("Failed to fetch feed for group {}", group_id))?
    {
        debug!(count = posts.len(), "Received feed page");

        for post in &posts {
            if !in_range(&config.range, post) {
                debug!(post_id = %post.id, "Post outside date range");
                summary.skipped_posts += 1;
                on_progress(ProgressEvent::PostSkipped { post });
                continue;
            }

            summary.posts += 1;
            on_progress(ProgressEvent::PostStarted {
                post,
                number: summary.posts,
            });

            let count = export_post_comments(client, config, post, sink).await?;
            summary.comments += count;
            on_progress(ProgressEvent::CommentsWritten { post, count });

            if config.max_posts.is_some_and(|max| summary.posts >= max) {
                info!(max_posts = summary.posts, "Reached post limit");
                break 'feed;
            }
        }
    }

    sink.flush()?;

    info!(
        posts = summary.posts,
        skipped = summary.skipped_posts,
        comments = summary.comments,
        feed_pages = feed.pages_fetched(),
        "Export finished"
    );

    Ok(summary)
}

async fn export_post_comments<W: Write>(
    client: &GraphClient,
    config: &ExportConfig,
    post: &Post,
    sink: &mut CommentWriter<W>,
) -> Result<u64> {
    let mut comments = client.comments(&post.id, config.comment_order, config.page_size);
    let mut count = 0;

    while let Some(page) = comments
        .next_page()
        .await
        .with_context(|| format!("Failed to fetch comments for post {}", post.id))?
    {
        for comment in &page {
            sink.write_row(&CommentRow::new(post, comment))?;
            count += 1;
        }
        sink.flush()?;
    }

    debug!(post_id = %post.id, count, pages = comments.pages_fetched(), "Post done");

    Ok(count)
}
