use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fb_comments_lib::{
    export_comments, AccessToken, CommentOrder, CommentWriter, ConfigError, DateRange,
    ExportConfig, ExportSummary, GraphClient, ProgressEvent, DEFAULT_API_VERSION, MAX_PAGE_SIZE,
    TOKEN_ENV_VAR,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fb-comments")]
#[command(about = "Export the comments on a Facebook group's posts to CSV")]
struct Args {
    /// Numeric ID of the Facebook group
    #[arg(long)]
    group_id: String,

    /// Graph API access token (falls back to the FB_ACCESS_TOKEN environment variable)
    #[arg(long)]
    access_token: Option<String>,

    /// Destination CSV file, or `-` for stdout
    #[arg(short, long, default_value = "comments.csv")]
    output: String,

    /// Earliest post to include (unix seconds, RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Latest post to include (unix seconds, RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    until: Option<String>,

    /// Stop after exporting this many posts
    #[arg(long)]
    max_posts: Option<u64>,

    /// Items requested per page
    #[arg(long, default_value_t = MAX_PAGE_SIZE,
          value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_PAGE_SIZE)))]
    page_size: u32,

    /// Order of comments within each post
    #[arg(long, value_enum, default_value_t = Order::Chronological)]
    comment_order: Order,

    /// Graph API version
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Override the Graph API base URL (including version)
    #[arg(long, hide = true)]
    base_url: Option<String>,

    /// Show more log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Order {
    Chronological,
    ReverseChronological,
}

impl From<Order> for CommentOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Chronological => CommentOrder::Chronological,
            Order::ReverseChronological => CommentOrder::ReverseChronological,
        }
    }
}

impl Args {
    fn export_config(&self) -> Result<ExportConfig, ConfigError> {
        let config = ExportConfig {
            group_id: self.group_id.trim().to_string(),
            range: DateRange::parse(self.since.as_deref(), self.until.as_deref())?,
            max_posts: self.max_posts,
            page_size: self.page_size,
            comment_order: self.comment_order.into(),
        };
        config.validate()?;
        Ok(config)
    }

    fn writes_to_stdout(&self) -> bool {
        self.output == "-"
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,fb_comments={level},fb_comments_lib={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn open_output(path: &str) -> Result<Box<dyn Write>> {
    if path == "-" {
        return Ok(Box::new(io::stdout()));
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path))?;
    Ok(Box::new(file))
}

/// Everything after argument parsing. The token and settings are checked
/// before the output file is created or any request is sent.
async fn run(args: &Args, env_token: Option<String>) -> Result<ExportSummary> {
    let token = AccessToken::resolve(args.access_token.clone(), env_token)?;
    let config = args.export_config()?;

    let client = match &args.base_url {
        Some(base) => GraphClient::with_base_url(token, base)?,
        None => GraphClient::new(token, &args.api_version)?,
    };
    info!(group_id = %config.group_id, base_url = client.base_url(), "Starting export");

    let mut sink = CommentWriter::new(open_output(&args.output)?)?;

    let pb = spinner(args.quiet);
    let mut comments = 0;
    let summary = export_comments(&client, &config, &mut sink, |event| match event {
        ProgressEvent::PostStarted { post, number } => {
            pb.set_message(format!("post {} ({}), {} comments so far", number, post.id, comments));
        }
        ProgressEvent::CommentsWritten { count, .. } => comments += count,
        ProgressEvent::PostSkipped { .. } => {}
    })
    .await;
    pb.finish_and_clear();

    let summary = summary?;
    sink.into_inner()?.flush().context("Failed to flush output")?;

    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    let summary = run(&args, std::env::var(TOKEN_ENV_VAR).ok()).await?;

    if !args.quiet {
        eprintln!(
            "Exported {} comments from {} posts ({} skipped by date)",
            summary.comments, summary.posts, summary.skipped_posts
        );
    }
    if !args.writes_to_stdout() {
        eprintln!("Comments exported to {}", args.output);
    }

    Ok(())
}
