//! Per-host history of completed snapshots (`<data-dir>/<hostname>/metadata.json`)

use crate::{Result, SnapError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const METADATA_FILE: &str = "metadata.json";

/// One completed snapshot in a host's history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    #[serde(alias = "timestamp")]
    pub snapshot_id: String,

    #[serde(alias = "url")]
    pub source_url: String,

    pub asset_count: u64,

    pub page_count: u64,

    pub created_at: DateTime<Utc>,
}

/// Reads and appends host metadata logs under a data root
///
/// Appends for the same host are serialized through a per-host async lock,
/// so concurrent completions within one process never drop an entry.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    data_root: PathBuf,
    host_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl MetadataStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            host_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Path of the metadata log for a host
    pub fn metadata_path(&self, hostname: &str) -> PathBuf {
        self.data_root.join(hostname).join(METADATA_FILE)
    }

    /// Appends an entry to the host's log
    ///
    /// Reads the existing log (empty if absent), appends, and writes the full
    /// list back through a temporary file so readers never see a partial file.
    pub async fn record(&self, hostname: &str, entry: MetadataEntry) -> Result<()> {
        check_hostname(hostname)?;

        let lock = self.lock_for(hostname);
        let _guard = lock.lock().await;

        let path = self.metadata_path(hostname);
        let mut entries = read_entries(&path).await?;
        entries.push(entry);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&entries)?).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(
            "Recorded snapshot for {} ({} entries in log)",
            hostname,
            entries.len()
        );
        Ok(())
    }

    /// Returns the host's log in append order, empty if none exists
    pub async fn list(&self, hostname: &str) -> Result<Vec<MetadataEntry>> {
        check_hostname(hostname)?;
        read_entries(&self.metadata_path(hostname)).await
    }

    /// Returns the most recently created entry for a host
    pub async fn latest(&self, hostname: &str) -> Result<Option<MetadataEntry>> {
        let entries = self.list(hostname).await?;
        Ok(entries.into_iter().max_by_key(|e| e.created_at))
    }

    fn lock_for(&self, hostname: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .host_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(hostname.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

async fn read_entries(path: &Path) -> Result<Vec<MetadataEntry>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Hostnames become directory names; reject anything path-like
fn check_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty()
        || hostname == "."
        || hostname == ".."
        || hostname.contains(['/', '\\'])
    {
        return Err(SnapError::Validation(format!(
            "invalid hostname '{}'",
            hostname
        )));
    }
    Ok(())
}
