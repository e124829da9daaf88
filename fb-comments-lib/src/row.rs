//! Flattened (post, comment) records and the CSV sink they are written to.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::graph::{Comment, Post};

/// Column names, in output order.
pub const CSV_HEADERS: [&str; 10] = [
    "post_id",
    "post_message",
    "post_created_time",
    "comment_id",
    "comment_message",
    "comment_created_time",
    "comment_author_id",
    "comment_author_name",
    "comment_like_count",
    "comment_reply_count",
];

/// One output row: a comment joined with the post it belongs to.
///
/// Field order is the column order; keep it in sync with [`CSV_HEADERS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentRow {
    pub post_id: String,
    pub post_message: String,
    pub post_created_time: String,
    pub comment_id: String,
    pub comment_message: String,
    pub comment_created_time: String,
    pub comment_author_id: String,
    pub comment_author_name: String,
    pub comment_like_count: u64,
    pub comment_reply_count: u64,
}

impl CommentRow {
    /// Missing text becomes an empty field, missing counts become zero.
    pub fn new(post: &Post, comment: &Comment) -> Self {
        let author = comment.from.as_ref();

        Self {
            post_id: post.id.clone(),
            post_message: post.message.clone().unwrap_or_default(),
            post_created_time: post.created_time.clone().unwrap_or_default(),
            comment_id: comment.id.clone(),
            comment_message: comment.message.clone().unwrap_or_default(),
            comment_created_time: comment.created_time.clone().unwrap_or_default(),
            comment_author_id: author.map(|a| a.id.clone()).unwrap_or_default(),
            comment_author_name: author.and_then(|a| a.name.clone()).unwrap_or_default(),
            comment_like_count: comment.like_count.unwrap_or(0),
            comment_reply_count: comment.comment_count.unwrap_or(0),
        }
    }
}

/// CSV sink that writes the header up front, so an export with no comments
/// still yields a valid file.
pub struct CommentWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> CommentWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        inner
            .write_record(CSV_HEADERS)
            .context("Failed to write CSV header")?;

        Ok(Self { inner, rows: 0 })
    }

    pub fn write_row(&mut self, row: &CommentRow) -> Result<()> {
        self.inner
            .serialize(row)
            .with_context(|| format!("Failed to write row for comment {}", row.comment_id))?;
        self.rows += 1;
        Ok(())
    }

    /// Push buffered rows through to the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().context("Failed to flush CSV output")
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to finish CSV output: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Author;

    fn post() -> Post {
        Post {
            id: "10_20".to_string(),
            message: Some("Hello, group".to_string()),
            created_time: Some("2024-03-01T12:30:00+0000".to_string()),
        }
    }

    fn output(writer: CommentWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_header_written_without_rows() {
        let writer = CommentWriter::new(Vec::new()).unwrap();
        assert_eq!(writer.rows_written(), 0);
        assert_eq!(output(writer), format!("{}\n", CSV_HEADERS.join(",")));
    }

    #[test]
    fn test_header_column_order() {
        let writer = CommentWriter::new(Vec::new()).unwrap();
        assert_eq!(
            output(writer).trim_end(),
            "post_id,post_message,post_created_time,comment_id,comment_message,\
             comment_created_time,comment_author_id,comment_author_name,\
             comment_like_count,comment_reply_count"
        );
    }

    #[test]
    fn test_row_flattening() {
        let comment = Comment {
            id: "10_20_30".to_string(),
            message: Some("First!".to_string()),
            created_time: Some("2024-03-01T13:00:00+0000".to_string()),
            from: Some(Author {
                id: "99".to_string(),
                name: Some("Ada Lovelace".to_string()),
            }),
            like_count: Some(4),
            comment_count: Some(2),
        };

        let mut writer = CommentWriter::new(Vec::new()).unwrap();
        writer.write_row(&CommentRow::new(&post(), &comment)).unwrap();
        assert_eq!(writer.rows_written(), 1);

        let text = output(writer);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[1],
            "10_20,\"Hello, group\",2024-03-01T12:30:00+0000,10_20_30,First!,\
             2024-03-01T13:00:00+0000,99,Ada Lovelace,4,2"
        );
    }

    #[test]
    fn test_missing_counts_are_zero_not_blank() {
        let comment = Comment {
            id: "c".to_string(),
            ..Default::default()
        };
        let row = CommentRow::new(&Post::default(), &comment);
        assert_eq!(row.comment_like_count, 0);
        assert_eq!(row.comment_reply_count, 0);
        assert_eq!(row.comment_author_name, "");

        let mut writer = CommentWriter::new(Vec::new()).unwrap();
        writer.write_row(&row).unwrap();
        let text = output(writer);
        assert_eq!(text.lines().nth(1), Some(",,,c,,,,,0,0"));
    }

    #[test]
    fn test_multiline_message_is_quoted() {
        let comment = Comment {
            id: "c".to_string(),
            message: Some("line one\nline \"two\"".to_string()),
            ..Default::default()
        };
        let mut writer = CommentWriter::new(Vec::new()).unwrap();
        writer.write_row(&CommentRow::new(&post(), &comment)).unwrap();

        let text = output(writer);
        assert!(text.contains("\"line one\nline \"\"two\"\"\""));
    }
}
