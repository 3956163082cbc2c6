//! Snapkeep: point-in-time local snapshots of websites
//!
//! This crate fetches a seed page, downloads and rewrites its embedded assets,
//! follows same-host links up to a page budget, and records each run as a
//! versioned archive on disk. Runs are tracked as background jobs whose progress
//! can be polled while they execute.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Snapkeep operations
#[derive(Debug, Error)]
pub enum SnapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTML rewrite error for {url}: {message}")]
    Rewrite { url: String, message: String },

    #[error("Invalid archive request: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition {
        from: jobs::JobStatus,
        to: jobs::JobStatus,
    },

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid skip pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Snapkeep operations
pub type Result<T> = std::result::Result<T, SnapError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ArchiveRequest, ArchiveSummary, CrawlEngine, CrawlProgress, SiteArchiver};
pub use jobs::{Job, JobId, JobRegistry, JobStatus, JobSummary};
pub use storage::{MetadataEntry, MetadataStore};
pub use url::{normalize_page_url, resolve_asset_url};
