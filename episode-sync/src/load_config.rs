//! `load_config` module: resolves remote settings from CLI flags, the environment
//! and an optional YAML settings file.
//!
//! Precedence is flag, then environment (`CONTENT_API_URL`, `CONTENT_API_TOKEN`),
//! then the YAML file. The YAML file also names the REST path of each collection
//! and the request timeout; it never needs to hold the token.
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const BASE_URL_ENV: &str = "CONTENT_API_URL";
pub const TOKEN_ENV: &str = "CONTENT_API_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST path segment of each remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionPaths {
    pub episodes: String,
    pub tags: String,
    pub companies: String,
}

impl Default for CollectionPaths {
    fn default() -> Self {
        CollectionPaths {
            episodes: "podcasts".into(),
            tags: "tags".into(),
            companies: "companies".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    base_url: Option<String>,
    #[serde(default)]
    collections: CollectionPaths,
    timeout_secs: Option<u64>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub config: Option<PathBuf>,
}

/// Resolved settings for talking to the content API.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub collections: CollectionPaths,
    pub timeout: Duration,
}

impl Settings {
    /// Base URL and token, or a configuration error naming what is missing.
    pub fn remote(&self) -> Result<(&str, &str)> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            anyhow!("Missing API base URL: pass --base-url or set {BASE_URL_ENV}")
        })?;
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow!("Missing API token: pass --token or set {TOKEN_ENV}"))?;
        Ok((base_url, token))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_settings_file(path: &Path) -> Result<SettingsFile> {
    info!(config_path = ?path, "Loading settings from file");
    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read settings file");
        anyhow!("Failed to read settings file {:?}: {}", path, e)
    })?;
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse settings YAML");
        anyhow!("Failed to parse settings YAML: {e}")
    })
}

/// Merges flags, environment and the optional settings file.
pub fn load_config(overrides: &Overrides) -> Result<Settings> {
    let file = match &overrides.config {
        Some(path) => read_settings_file(path)?,
        None => SettingsFile::default(),
    };

    let base_url = non_empty(overrides.base_url.clone())
        .or_else(|| non_empty(std::env::var(BASE_URL_ENV).ok()))
        .or_else(|| non_empty(file.base_url))
        .map(|url| url.trim_end_matches('/').to_string());
    let token = non_empty(overrides.token.clone())
        .or_else(|| non_empty(std::env::var(TOKEN_ENV).ok()));

    let settings = Settings {
        base_url,
        token,
        collections: file.collections,
        timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    };
    info!(
        base_url = settings.base_url.as_deref().unwrap_or("<unset>"),
        token_set = settings.token.is_some(),
        episodes = %settings.collections.episodes,
        "Resolved remote settings"
    );
    Ok(settings)
}
