//! Crawler module for archiving a site into a snapshot
//!
//! This module contains the core archiving logic, including:
//! - HTTP fetching with per-request timeouts
//! - HTML parsing for asset references and same-host links
//! - Skip rules for assets that should stay remote
//! - Asset download and reference rewriting
//! - Request pacing and overall run orchestration

mod assets;
mod classifier;
mod engine;
mod fetcher;
mod parser;
mod rewriter;
mod throttle;

pub use assets::{derive_filename, extension_for_content_type, AssetDownloader};
pub use classifier::{AssetCategory, ResourceClassifier, SkipRule};
pub use engine::{
    ArchiveRequest, ArchiveSummary, CrawlEngine, CrawlProgress, NoopReporter, ProgressReporter,
    SiteArchiver,
};
pub use fetcher::{build_http_client, fetch_url, is_html_content_type, FetchResult};
pub use parser::{parse_page, AssetRef, PageTask, ParsedPage};
pub use rewriter::{rewrite_asset_refs, Replacements};
pub use throttle::{IntervalThrottle, NoThrottle, Throttle};
