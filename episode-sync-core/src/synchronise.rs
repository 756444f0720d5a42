//! High-level pipeline: reconciles every parsed record against the store.
//!
//! Records are processed strictly one after another, so the run-scoped
//! reference caches in [`RunContext`] need no locking. Concurrency only
//! happens inside a record, where tags and companies are resolved side by side.
//!
//! # Major Types
//! - [`RunSummary`]: outcome counters plus the dry-run flag
//! - [`SyncReport`]: the summary, every per-record report, and whether strict
//!   mode cut the run short
//!
//! # Error Handling
//! A failed record never aborts the pipeline by itself. In strict mode the
//! first failure stops the run after that record has been reported; the
//! caller decides how to surface [`SyncReport::halted_at`].

use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::contract::ContentStore;
use crate::delimited::Table;
use crate::reconcile::{reconcile_record, Outcome, RecordReport, RunContext};

/// Outcome counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records selected for processing (after the row limit).
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// Records that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

#[derive(Debug)]
pub struct SyncReport {
    pub summary: RunSummary,
    pub records: Vec<RecordReport>,
    /// Row at which strict mode stopped the run.
    pub halted_at: Option<usize>,
}

/// Runs the pipeline over `table`.
///
/// `on_record` is called once per record, right after it reaches its terminal
/// state and before the next one starts.
pub async fn synchronise<S, F>(
    store: &S,
    table: &Table,
    config: &SyncConfig,
    mut on_record: F,
) -> SyncReport
where
    S: ContentStore + ?Sized,
    F: FnMut(&RecordReport),
{
    let selected = match config.limit {
        Some(limit) => &table.records[..limit.min(table.records.len())],
        None => &table.records[..],
    };
    info!(
        total = selected.len(),
        available = table.records.len(),
        dry_run = config.dry_run,
        "[SYNC] Starting synchronisation"
    );

    let mut ctx = RunContext::new();
    let mut summary = RunSummary {
        total: selected.len(),
        dry_run: config.dry_run,
        ..RunSummary::default()
    };
    let mut records = Vec::with_capacity(selected.len());
    let mut halted_at = None;

    for (idx, record) in selected.iter().enumerate() {
        let row = idx + 1;
        let report = reconcile_record(store, &mut ctx, config, row, record).await;
        summary.record(&report.outcome);
        on_record(&report);

        let failed = matches!(report.outcome, Outcome::Failed(_));
        records.push(report);
        if failed && config.strict {
            warn!(row, "[SYNC] Strict mode: stopping after failed record");
            halted_at = Some(row);
            break;
        }
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        tags_cached = ctx.tags.len(),
        companies_cached = ctx.companies.len(),
        "[SYNC] Synchronisation finished"
    );

    SyncReport {
        summary,
        records,
        halted_at,
    }
}
