//! CLI interface for episode-sync: argument parsing, the async [`run`] entry
//! point, per-record progress output and the final summary table.
//!
//! All pipeline logic lives in `episode-sync-core`; this module only wires the
//! command line, the settings and the HTTP client together.

use crate::client::{ContentApiClient, OfflineStore};
use crate::load_config::{load_config, Overrides};
use anyhow::{bail, Context, Result};
use clap::Parser;
use episode_sync_core::config::SyncConfig;
use episode_sync_core::contract::ContentStore;
use episode_sync_core::delimited;
use episode_sync_core::payload::unrecognized_headers;
use episode_sync_core::reconcile::{Outcome, RecordReport};
use episode_sync_core::synchronise::{synchronise, RunSummary};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

const COLUMNS_HELP: &str = "\
Recognized columns (case, spaces, '_' and '-' are ignored):
  title | name              episode title (required)
  slug                      URL slug, derived from the title when blank
  publishedDate | date      YYYY-MM-DD, M/D/YYYY or any common date format
  podcastStatus | status    published | draft
  podcastType | type        internal | external
  episodeNumber | episode   integer
  duration, audioUrl, buzzsproutEpisodeId, buzzsproutEmbedCode
  description | summary     free text, blank lines separate paragraphs
  useNativePlayer | nativePlayer   true/false, yes/no, 1/0
  tags, companies | company       lists separated by '|', ';' or ','
  platformLinks             JSON array of {platform, url}
  appleUrl, spotifyUrl, youtubeUrl, substackUrl, twitterUrl
  transcriptStatus, transcriptSource, transcriptGeneratedAt,
  transcriptSrt, transcriptVtt, transcriptSegments (JSON)

Environment:
  CONTENT_API_URL           API base URL (when --base-url is not given)
  CONTENT_API_TOKEN         API token (when --token is not given)";

/// CLI for episode-sync: import an episode spreadsheet into the content API.
#[derive(Parser, Debug)]
#[command(
    name = "episode-sync",
    version,
    about = "Create or update podcast episodes in a content API from a CSV file",
    after_help = COLUMNS_HELP
)]
pub struct Cli {
    /// Path to the CSV file to import
    pub file: PathBuf,

    /// API base URL (defaults to $CONTENT_API_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// API token (defaults to $CONTENT_API_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Optional YAML settings file (collection paths, timeout)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Parse, normalize and resolve without any remote call
    #[arg(long)]
    pub dry_run: bool,

    /// Do not create tags or companies that are missing remotely
    #[arg(long)]
    pub no_create_refs: bool,

    /// Stop at the first failed record and exit with status 1
    #[arg(long)]
    pub strict: bool,

    /// Only process the first N records
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

impl Cli {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            dry_run: self.dry_run,
            create_missing_refs: !self.no_create_refs,
            strict: self.strict,
            limit: self.limit,
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            config: self.config.clone(),
        }
    }
}

/// Async CLI entry point, shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("run_started");

    let config = cli.sync_config();
    config.trace_loaded();
    let settings = load_config(&cli.overrides())?;

    let store: Box<dyn ContentStore> = if config.dry_run {
        Box::new(OfflineStore)
    } else {
        Box::new(ContentApiClient::new(&settings)?)
    };

    let text = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read input file {:?}", cli.file))?;
    let table = delimited::parse(&text);
    let unknown = unrecognized_headers(&table.headers);
    if !unknown.is_empty() {
        tracing::warn!(columns = ?unknown, "Ignoring unrecognized columns");
    }
    tracing::info!(file = ?cli.file, records = table.records.len(), "Input parsed");

    let dry_run = config.dry_run;
    let report = synchronise(store.as_ref(), &table, &config, |record| {
        println!("{}", progress_line(record, dry_run))
    })
    .await;

    print_summary(&report.summary);

    if let Some(row) = report.halted_at {
        tracing::error!(row, "Stopped early in strict mode");
        bail!("strict mode: stopped after failed row {row}");
    }
    Ok(())
}

/// One line per record: outcome verb plus slug or reason.
pub fn progress_line(record: &RecordReport, dry_run: bool) -> String {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let slug = record.slug.as_deref().unwrap_or("?");
    let detail = match &record.outcome {
        Outcome::Created => format!("created {slug}"),
        Outcome::Updated => format!("updated {slug}"),
        Outcome::Skipped(reason) => format!("skipped {slug}: {reason}"),
        Outcome::Failed(reason) => format!("failed {slug}: {reason}"),
    };
    format!("{prefix}[row {}] {detail}", record.row)
}

#[derive(Tabled)]
struct SummaryRow {
    total: usize,
    created: usize,
    updated: usize,
    skipped: usize,
    failed: usize,
    #[tabled(rename = "dry run")]
    dry_run: bool,
}

fn print_summary(summary: &RunSummary) {
    let mut table = Table::new([SummaryRow {
        total: summary.total,
        created: summary.created,
        updated: summary.updated,
        skipped: summary.skipped,
        failed: summary.failed,
        dry_run: summary.dry_run,
    }]);
    table.with(Style::rounded());
    println!("{table}");
}
