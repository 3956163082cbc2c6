//! Asset downloader writing into a snapshot's `assets/` directory

use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::storage::SnapshotDir;
use crate::{Result, SnapError};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Fallback name for URLs whose path has no usable basename
const FALLBACK_NAME: &str = "asset";

/// Longest derived filename kept verbatim
const MAX_FILENAME_LEN: usize = 100;

/// Longest suffix after the last dot still treated as an extension
const MAX_EXTENSION_LEN: usize = 16;

/// Downloads assets for one snapshot, tracking which URL owns each filename
///
/// The same absolute URL always maps to the same file. When two different
/// URLs derive the same filename, the later one gets a short hash suffix.
pub struct AssetDownloader {
    client: Client,
    timeout: Duration,
    snapshot: SnapshotDir,
    /// filename -> absolute URL written under it
    owners: HashMap<String, String>,
    /// absolute URL -> filename
    saved: HashMap<String, String>,
}

impl AssetDownloader {
    pub fn new(client: Client, timeout: Duration, snapshot: SnapshotDir) -> Self {
        Self {
            client,
            timeout,
            snapshot,
            owners: HashMap::new(),
            saved: HashMap::new(),
        }
    }

    /// Filename already saved for `url` in this snapshot, if any
    pub fn saved_filename(&self, url: &Url) -> Option<&str> {
        self.saved.get(url.as_str()).map(String::as_str)
    }

    /// Number of distinct files written so far
    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    /// Fetches `url` and writes it under `assets/`, returning the filename
    ///
    /// Network, status and write failures are returned as errors for the
    /// caller to log. A failed write leaves the filename unclaimed.
    pub async fn download(&mut self, url: &Url) -> Result<String> {
        let (content_type, body) = match fetch_url(&self.client, url.as_str(), self.timeout).await {
            FetchResult::Success {
                content_type, body, ..
            } => (content_type, body),
            FetchResult::HttpError { status_code } => {
                return Err(SnapError::HttpStatus {
                    url: url.to_string(),
                    status: status_code,
                })
            }
            FetchResult::NetworkError { error } => {
                return Err(SnapError::Fetch {
                    url: url.to_string(),
                    message: error,
                })
            }
        };

        let filename = match self.saved.get(url.as_str()) {
            Some(existing) => existing.clone(),
            None => self.pick_filename(url, &derive_filename(url, &content_type)),
        };

        self.snapshot.write_asset(&filename, &body).await?;
        self.owners.insert(filename.clone(), url.to_string());
        self.saved.insert(url.to_string(), filename.clone());

        tracing::debug!("Saved asset {} as {} ({} bytes)", url, filename, body.len());
        Ok(filename)
    }

    /// Returns `candidate`, suffixed if another URL already owns it
    fn pick_filename(&self, url: &Url, candidate: &str) -> String {
        match self.owners.get(candidate) {
            Some(owner) if owner != url.as_str() => with_hash_suffix(candidate, url),
            _ => candidate.to_string(),
        }
    }
}

/// Derives a local filename from the URL path, falling back to the content type
///
/// Names longer than 100 bytes are truncated and given a hash suffix of the
/// URL, keeping the extension.
///
/// # Examples
///
/// ```
/// use snapkeep::crawler::derive_filename;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/img/logo.png?x=1").unwrap();
/// assert_eq!(derive_filename(&url, "image/png"), "logo.png");
///
/// let url = Url::parse("https://example.com/styles").unwrap();
/// assert_eq!(derive_filename(&url, "text/css; charset=utf-8"), "styles.css");
/// ```
pub fn derive_filename(url: &Url, content_type: &str) -> String {
    let basename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");
    let decoded = urlencoding::decode(basename)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| basename.to_string());

    let mut name = sanitize_filename(&decoded);
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }

    if !has_extension(&name) {
        name.push_str(extension_for_content_type(content_type));
    }

    if name.len() > MAX_FILENAME_LEN {
        name = with_hash_suffix(&truncate_filename(&name), url);
    }
    name
}

/// Cuts a sanitized (ASCII) name to the length limit, keeping a short extension
fn truncate_filename(name: &str) -> String {
    let ext = match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx <= MAX_EXTENSION_LEN => &name[idx..],
        _ => "",
    };
    let stem = &name[..name.len() - ext.len()];
    let keep = MAX_FILENAME_LEN.saturating_sub(ext.len()).min(stem.len());
    format!("{}{}", &stem[..keep], ext)
}

/// Extension for a Content-Type, including the dot, or empty if unknown
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "text/css" => ".css",
        "application/javascript" => ".js",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "image/webp" => ".webp",
        _ => "",
    }
}

fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Leading dots would make hidden files or `..`
    cleaned.trim_start_matches('.').to_string()
}

fn has_extension(name: &str) -> bool {
    match name.rfind('.') {
        Some(idx) => idx > 0 && idx < name.len() - 1,
        None => false,
    }
}

fn with_hash_suffix(filename: &str, url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let suffix = &digest[..8];

    match filename.rfind('.') {
        Some(idx) if idx > 0 => format!("{}-{}{}", &filename[..idx], suffix, &filename[idx..]),
        _ => format!("{}-{}", filename, suffix),
    }
}
