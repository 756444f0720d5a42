//! # contract: interface to the remote content store
//!
//! The pipeline never talks HTTP itself. Everything it needs from the remote
//! side goes through the [`ContentStore`] trait: a slug lookup, a create and an
//! update, each scoped to a [`Collection`]. The CLI crate implements it against
//! the real API; tests use the `mockall`-generated `MockContentStore`.
//!
//! Errors are reported as [`StoreError`], which keeps the HTTP status and body
//! of a rejected request so callers can surface them verbatim.

use async_trait::async_trait;
use mockall::automock;
use serde_json::{Map, Value};
use thiserror::Error;

/// Remote collections the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Episodes,
    Tags,
    Companies,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Episodes => "episodes",
            Collection::Tags => "tags",
            Collection::Companies => "companies",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote entry as returned by a lookup or a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Durable identifier used to address updates and relations.
    pub id: String,
    pub slug: Option<String>,
}

/// Create a new entry, or update the entry with the given durable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update { id: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Access to the remote content store.
///
/// `publish` asks the store to make the written entry live immediately rather
/// than leaving it as a draft. Stores are free to reject that hint.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Finds the entry whose slug equals `slug` exactly.
    async fn find_by_slug(
        &self,
        collection: Collection,
        slug: &str,
    ) -> Result<Option<RemoteEntry>, StoreError>;

    async fn create(
        &self,
        collection: Collection,
        data: &Map<String, Value>,
        publish: bool,
    ) -> Result<RemoteEntry, StoreError>;

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
        publish: bool,
    ) -> Result<RemoteEntry, StoreError>;
}
