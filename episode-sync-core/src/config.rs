use tracing::{debug, info};

/// Run-level switches for one synchronisation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Parse, normalize and resolve without any remote lookup or write.
    pub dry_run: bool,
    /// Create tags/companies that do not exist remotely yet.
    pub create_missing_refs: bool,
    /// Stop after the first failed record.
    pub strict: bool,
    /// Only process the first `limit` records.
    pub limit: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            dry_run: false,
            create_missing_refs: true,
            strict: false,
            limit: None,
        }
    }
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            dry_run = self.dry_run,
            create_missing_refs = self.create_missing_refs,
            strict = self.strict,
            limit = ?self.limit,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
