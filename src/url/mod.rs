//! URL handling module for Snapkeep
//!
//! This module provides page-URL normalization for the visited set, asset and
//! link resolution against a page, save-path computation, and hostname
//! helpers used to keep a crawl on its seed host.

mod domain;
mod normalize;
mod resolve;

// Re-export main functions
pub use domain::{extract_hostname, is_same_host, parse_seed_url};
pub use normalize::normalize_page_url;
pub use resolve::{resolve_asset_url, resolve_link, save_path_for};
