//! Storage module for archive output
//!
//! This module owns everything written under the data directory:
//! - `SnapshotDir`: one snapshot's pages and `assets/`
//! - `MetadataStore`: the per-host `metadata.json` history log

mod metadata;
mod snapshot;

pub use metadata::{MetadataEntry, MetadataStore};
pub use snapshot::{asset_href, snapshot_id_at, SnapshotDir, ASSETS_DIR};
