//! On-disk layout of a single snapshot
//!
//! ```text
//! <data-dir>/<hostname>/<snapshot-id>/index.html
//! <data-dir>/<hostname>/<snapshot-id>/<nested>/<page>.html
//! <data-dir>/<hostname>/<snapshot-id>/assets/<file>
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Name of the asset subdirectory inside every snapshot
pub const ASSETS_DIR: &str = "assets";

/// Builds a filesystem-safe snapshot id from a timestamp
///
/// The id is the RFC 3339 millisecond timestamp with `:` and `.` replaced by `-`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use snapkeep::storage::snapshot_id_at;
///
/// let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
/// assert_eq!(snapshot_id_at(at), "2024-01-15T10-30-00-000Z");
/// ```
pub fn snapshot_id_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Handle to one snapshot directory
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
    hostname: String,
    snapshot_id: String,
}

impl SnapshotDir {
    /// Creates the snapshot directory and its `assets/` subdirectory
    pub async fn create(data_root: &Path, hostname: &str, snapshot_id: &str) -> io::Result<Self> {
        let root = data_root.join(hostname).join(snapshot_id);
        tokio::fs::create_dir_all(root.join(ASSETS_DIR)).await?;

        Ok(Self {
            root,
            hostname: hostname.to_string(),
            snapshot_id: snapshot_id.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// Writes a page at `rel_path`, creating parent directories as needed
    pub async fn write_page(&self, rel_path: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let path = safe_join(&self.root, rel_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// Writes an asset into `assets/`, overwriting any file of the same name
    pub async fn write_asset(&self, filename: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let path = safe_join(&self.assets_dir(), filename)?;
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}

/// The reference a page at `page_rel_path` uses to reach an asset
///
/// Root pages use `./assets/<file>`; nested pages climb one `../` per
/// directory level.
///
/// # Examples
///
/// ```
/// use snapkeep::storage::asset_href;
///
/// assert_eq!(asset_href("index.html", "logo.png"), "./assets/logo.png");
/// assert_eq!(asset_href("docs/intro.html", "logo.png"), "../assets/logo.png");
/// ```
pub fn asset_href(page_rel_path: &str, filename: &str) -> String {
    let depth = page_rel_path.matches('/').count();
    if depth == 0 {
        format!("./{}/{}", ASSETS_DIR, filename)
    } else {
        format!("{}{}/{}", "../".repeat(depth), ASSETS_DIR, filename)
    }
}

/// Joins a relative path onto `base`, refusing anything that could escape it
fn safe_join(base: &Path, rel_path: &str) -> io::Result<PathBuf> {
    let rel = Path::new(rel_path);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));

    if rel_path.is_empty() || escapes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to write outside snapshot: {}", rel_path),
        ));
    }

    Ok(base.join(rel))
}
