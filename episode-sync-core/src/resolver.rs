//! Reference resolver: display name -> durable remote identifier.
//!
//! Resolution order is cache, remote slug lookup, then (if allowed) creation.
//! The cache is owned by the run and keyed by canonical slug, so a tag that
//! appears on fifty rows is looked up once and created at most once.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::contract::{Collection, ContentStore, StoreError};
use crate::normalize::slugify;

/// Resolved reference handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub id: String,
    pub slug: String,
}

/// Run-scoped cache for one reference collection.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    entries: HashMap<String, RemoteRef>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slug: &str) -> Option<&RemoteRef> {
        self.entries.get(slug)
    }

    /// Stores a handle unless the slug is already cached, and returns the
    /// cached handle. A slug never maps to two identifiers within a run.
    pub fn insert(&mut self, handle: RemoteRef) -> RemoteRef {
        self.entries
            .entry(handle.slug.clone())
            .or_insert(handle)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves names in one reference collection against a store.
pub struct ReferenceResolver<'a, S: ?Sized> {
    store: &'a S,
    collection: Collection,
    allow_create: bool,
    dry_run: bool,
}

impl<'a, S: ContentStore + ?Sized> ReferenceResolver<'a, S> {
    pub fn new(store: &'a S, collection: Collection, config: &SyncConfig) -> Self {
        ReferenceResolver {
            store,
            collection,
            allow_create: config.create_missing_refs,
            dry_run: config.dry_run,
        }
    }

    /// Resolves one display name.
    ///
    /// Returns `Ok(None)` for names with an empty canonical form, and for
    /// unknown names when creation is disabled or keeps failing. Lookup
    /// failures are returned as errors.
    pub async fn resolve(
        &self,
        cache: &mut ReferenceCache,
        name: &str,
    ) -> Result<Option<RemoteRef>, StoreError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Ok(None);
        }
        if let Some(hit) = cache.get(&slug) {
            return Ok(Some(hit.clone()));
        }

        if self.dry_run {
            let handle = RemoteRef {
                id: slug.clone(),
                slug,
            };
            return Ok(Some(cache.insert(handle)));
        }

        if let Some(entry) = self.store.find_by_slug(self.collection, &slug).await? {
            debug!(collection = %self.collection, slug = %slug, id = %entry.id, "Found existing reference");
            return Ok(Some(cache.insert(RemoteRef { id: entry.id, slug })));
        }

        if !self.allow_create {
            debug!(collection = %self.collection, slug = %slug, "Reference missing and creation disabled");
            return Ok(None);
        }

        let mut data = Map::new();
        data.insert("name".into(), Value::String(name.trim().to_string()));
        data.insert("slug".into(), Value::String(slug.clone()));

        let created = match self.store.create(self.collection, &data, true).await {
            Ok(entry) => Ok(entry),
            Err(e) => {
                debug!(collection = %self.collection, slug = %slug, error = %e, "Published create rejected, retrying as plain create");
                self.store.create(self.collection, &data, false).await
            }
        };

        match created {
            Ok(entry) => {
                info!(collection = %self.collection, slug = %slug, id = %entry.id, "Created reference");
                Ok(Some(cache.insert(RemoteRef { id: entry.id, slug })))
            }
            Err(e) => {
                warn!(collection = %self.collection, slug = %slug, error = %e, "Could not create reference, omitting it");
                Ok(None)
            }
        }
    }

    /// Resolves a list of names one after another, keeping input order and
    /// dropping names that did not resolve or repeat an earlier one.
    pub async fn resolve_all(
        &self,
        cache: &mut ReferenceCache,
        names: &[String],
    ) -> Result<Vec<RemoteRef>, StoreError> {
        let mut resolved: Vec<RemoteRef> = Vec::with_capacity(names.len());
        for name in names {
            if let Some(handle) = self.resolve(cache, name).await? {
                if !resolved.contains(&handle) {
                    resolved.push(handle);
                }
            }
        }
        Ok(resolved)
    }
}
