#![doc = "Content API client: the networked implementation of the core `ContentStore` trait."]
//
//! # Content API client
//!
//! [`ContentApiClient`] speaks to a headless CMS REST API. Entries are
//! addressed under `{base_url}/api/{collection path}`; every request carries a
//! bearer token, and request/response bodies are wrapped in a `data` envelope.
//!
//! - Lookup: `GET ?filters[slug][$eq]=..&fields[0]=slug&pagination[pageSize]=1`
//! - Create: `POST` with `{"data": {...}}`
//! - Update: `PUT /{documentId}` with `{"data": {...}}`
//! - Publish intent: `?status=published` on either write
//!
//! [`OfflineStore`] stands in during dry runs, where the pipeline promises not
//! to touch the remote at all.

use async_trait::async_trait;
use episode_sync_core::contract::{Collection, ContentStore, RemoteEntry, StoreError};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};

use crate::load_config::{CollectionPaths, Settings};

pub struct ContentApiClient {
    http: Client,
    base_url: String,
    token: String,
    collections: CollectionPaths,
}

impl ContentApiClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let (base_url, token) = settings.remote()?;
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
        tracing::info!(base_url, timeout = ?settings.timeout, "Initialized ContentApiClient");
        Ok(ContentApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            collections: settings.collections.clone(),
        })
    }

    fn collection_path(&self, collection: Collection) -> &str {
        match collection {
            Collection::Episodes => &self.collections.episodes,
            Collection::Tags => &self.collections.tags,
            Collection::Companies => &self.collections.companies,
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!(
            "{}/api/{}",
            self.base_url,
            self.collection_path(collection).trim_matches('/')
        )
    }

    fn entry_url(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), id)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), body = %body, "Content API rejected request");
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

fn publish_query(publish: bool) -> &'static [(&'static str, &'static str)] {
    if publish {
        &[("status", "published")]
    } else {
        &[]
    }
}

/// Reads one entry object; `documentId` is preferred over the numeric `id`.
pub(crate) fn decode_entry(value: &Value) -> Option<RemoteEntry> {
    let id = match value.get("documentId").and_then(Value::as_str) {
        Some(doc_id) => doc_id.to_string(),
        None => match value.get("id")? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => return None,
        },
    };
    Some(RemoteEntry {
        id,
        slug: value
            .get("slug")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// First entry of a list response, `None` for an empty page.
pub(crate) fn decode_first(body: &Value) -> Result<Option<RemoteEntry>, StoreError> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Decode("list response without a data array".into()))?;
    match data.first() {
        None => Ok(None),
        Some(entry) => decode_entry(entry)
            .map(Some)
            .ok_or_else(|| StoreError::Decode("entry without an identifier".into())),
    }
}

/// The entry of a single-item response.
pub(crate) fn decode_single(body: &Value) -> Result<RemoteEntry, StoreError> {
    body.get("data")
        .and_then(decode_entry)
        .ok_or_else(|| StoreError::Decode("write response without an entry".into()))
}

#[async_trait]
impl ContentStore for ContentApiClient {
    async fn find_by_slug(
        &self,
        collection: Collection,
        slug: &str,
    ) -> Result<Option<RemoteEntry>, StoreError> {
        tracing::debug!(%collection, slug, "Looking up entry by slug");
        let request = self.http.get(self.collection_url(collection)).query(&[
            ("filters[slug][$eq]", slug),
            ("fields[0]", "slug"),
            ("pagination[pageSize]", "1"),
        ]);
        let body = self.send(request).await?;
        decode_first(&body)
    }

    async fn create(
        &self,
        collection: Collection,
        data: &Map<String, Value>,
        publish: bool,
    ) -> Result<RemoteEntry, StoreError> {
        tracing::info!(%collection, publish, "Creating entry");
        let request = self
            .http
            .post(self.collection_url(collection))
            .query(publish_query(publish))
            .json(&json!({ "data": data }));
        let body = self.send(request).await?;
        decode_single(&body)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
        publish: bool,
    ) -> Result<RemoteEntry, StoreError> {
        tracing::info!(%collection, id, publish, "Updating entry");
        let request = self
            .http
            .put(self.entry_url(collection, id))
            .query(publish_query(publish))
            .json(&json!({ "data": data }));
        let body = self.send(request).await?;
        decode_single(&body)
    }
}

/// Store used for dry runs. Every call fails, so a stray remote access shows
/// up as a failed record instead of a silent write.
pub struct OfflineStore;

#[async_trait]
impl ContentStore for OfflineStore {
    async fn find_by_slug(
        &self,
        collection: Collection,
        _slug: &str,
    ) -> Result<Option<RemoteEntry>, StoreError> {
        Err(offline(collection))
    }

    async fn create(
        &self,
        collection: Collection,
        _data: &Map<String, Value>,
        _publish: bool,
    ) -> Result<RemoteEntry, StoreError> {
        Err(offline(collection))
    }

    async fn update(
        &self,
        collection: Collection,
        _id: &str,
        _data: &Map<String, Value>,
        _publish: bool,
    ) -> Result<RemoteEntry, StoreError> {
        Err(offline(collection))
    }
}

fn offline(collection: Collection) -> StoreError {
    StoreError::Transport(format!("remote access to {collection} disabled in dry run"))
}
