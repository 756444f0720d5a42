//! Record reconciler: one input row in, one terminal outcome out.
//!
//! The steps are: title and slug, remote lookup, normalization and relation
//! resolution, payload assembly, then a create or update with a single
//! publish-less retry. Every error raised on the way is turned into
//! [`Outcome::Failed`] here; nothing escapes to the orchestrator.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::contract::{Collection, ContentStore, RemoteEntry, StoreError, WriteMode};
use crate::delimited::RawRecord;
use crate::normalize::Field;
use crate::payload::{self, Payload, COMPANIES, TAGS};
use crate::resolver::{ReferenceCache, ReferenceResolver, RemoteRef};

/// Run-scoped state shared by every record: one reference cache per
/// reference collection.
#[derive(Debug, Default)]
pub struct RunContext {
    pub tags: ReferenceCache,
    pub companies: ReferenceCache,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped(String),
    Failed(String),
}

/// Outcome of one record together with the slug it was reconciled under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    /// 1-based data row number.
    pub row: usize,
    pub slug: Option<String>,
    pub outcome: Outcome,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("title is required")]
    MissingTitle,

    #[error("slug could not be derived")]
    MissingSlug,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reconciles one record against the store. Never fails: errors become
/// [`Outcome::Failed`] with a readable reason.
pub async fn reconcile_record<S>(
    store: &S,
    ctx: &mut RunContext,
    config: &SyncConfig,
    row: usize,
    record: &RawRecord,
) -> RecordReport
where
    S: ContentStore + ?Sized,
{
    let mut slug = None;
    let outcome = match try_reconcile(store, ctx, config, record, &mut slug).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(row, slug = ?slug, error = %e, "Record failed");
            Outcome::Failed(e.to_string())
        }
    };
    RecordReport { row, slug, outcome }
}

async fn try_reconcile<S>(
    store: &S,
    ctx: &mut RunContext,
    config: &SyncConfig,
    record: &RawRecord,
    slug_out: &mut Option<String>,
) -> Result<Outcome, ReconcileError>
where
    S: ContentStore + ?Sized,
{
    let title = payload::episode_title(record).ok_or(ReconcileError::MissingTitle)?;
    let slug = payload::episode_slug(record, &title).ok_or(ReconcileError::MissingSlug)?;
    *slug_out = Some(slug.clone());

    let existing = if config.dry_run {
        None
    } else {
        store.find_by_slug(Collection::Episodes, &slug).await?
    };

    let mut payload = Payload::new(&title, &slug);
    payload::fill_scalar_fields(record, &mut payload);

    let (tags, companies) = resolve_relations(store, ctx, config, record).await?;
    payload.set(TAGS.field, tags);
    payload.set(COMPANIES.field, companies);

    if !payload::has_populated_fields(record) || !payload.has_content() {
        return Ok(Outcome::Skipped("no fields to update".into()));
    }

    let mode = match existing {
        Some(entry) => WriteMode::Update { id: entry.id },
        None => {
            payload::apply_enum_defaults(record, &mut payload);
            WriteMode::Create
        }
    };
    let publish = payload.publish_requested();
    debug!(slug = %slug, ?mode, publish, payload = ?payload.as_map(), "Assembled payload");

    if config.dry_run {
        return Ok(outcome_for(&mode));
    }

    let entry = write_with_fallback(store, &mode, payload.as_map(), publish).await?;
    info!(slug = %slug, id = %entry.id, ?mode, "Wrote episode");
    Ok(outcome_for(&mode))
}

fn outcome_for(mode: &WriteMode) -> Outcome {
    match mode {
        WriteMode::Create => Outcome::Created,
        WriteMode::Update { .. } => Outcome::Updated,
    }
}

/// Resolves the tag and company columns concurrently. The two lists touch
/// different caches and collections; entries within a list go one by one.
async fn resolve_relations<S>(
    store: &S,
    ctx: &mut RunContext,
    config: &SyncConfig,
    record: &RawRecord,
) -> Result<(Field<Value>, Field<Value>), StoreError>
where
    S: ContentStore + ?Sized,
{
    let RunContext { tags, companies } = ctx;
    let tag_resolver = ReferenceResolver::new(store, Collection::Tags, config);
    let company_resolver = ReferenceResolver::new(store, Collection::Companies, config);

    let tag_names = payload::relation_names(record, &TAGS);
    let company_names = payload::relation_names(record, &COMPANIES);

    let (tags, companies) = futures::join!(
        resolve_relation(&tag_resolver, tags, tag_names),
        resolve_relation(&company_resolver, companies, company_names),
    );
    Ok((tags?, companies?))
}

async fn resolve_relation<S>(
    resolver: &ReferenceResolver<'_, S>,
    cache: &mut ReferenceCache,
    names: Option<Vec<String>>,
) -> Result<Field<Value>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let Some(names) = names else {
        return Ok(Field::Absent);
    };
    let handles = resolver.resolve_all(cache, &names).await?;
    let ids: Vec<Value> = handles
        .into_iter()
        .map(|RemoteRef { id, .. }| Value::String(id))
        .collect();
    Ok(Field::Value(Value::Array(ids)))
}

/// Writes a payload, asking for direct publication when `publish` is set.
///
/// If a publishing write fails it is retried exactly once without the hint;
/// the retry's result is final. Writes without the hint are not retried.
pub async fn write_with_fallback<S>(
    store: &S,
    mode: &WriteMode,
    data: &Map<String, Value>,
    publish: bool,
) -> Result<RemoteEntry, StoreError>
where
    S: ContentStore + ?Sized,
{
    let attempt = |publish: bool| async move {
        match mode {
            WriteMode::Create => store.create(Collection::Episodes, data, publish).await,
            WriteMode::Update { id } => store.update(Collection::Episodes, id, data, publish).await,
        }
    };

    match attempt(publish).await {
        Err(e) if publish => {
            debug!(error = %e, "Publishing write rejected, retrying without publish");
            attempt(false).await
        }
        result => result,
    }
}
