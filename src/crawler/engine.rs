//! Crawl engine - archive run orchestration
//!
//! One archive run walks a single host depth-first from its seed:
//! - Fetching each page and saving it under the snapshot
//! - Downloading the page's assets one at a time and rewriting references
//! - Discovering same-host links and queueing them until the page budget runs out
//!
//! Every network request in a run is awaited sequentially. A page or asset
//! that cannot be fetched or saved is logged and skipped; only failing to
//! create the snapshot directory ends a run early.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::assets::AssetDownloader;
use crate::crawler::classifier::ResourceClassifier;
use crate::crawler::fetcher::{build_http_client, fetch_url, is_html_content_type, FetchResult};
use crate::crawler::parser::{parse_page, AssetRef, PageTask};
use crate::crawler::rewriter::{rewrite_asset_refs, Replacements};
use crate::crawler::throttle::{IntervalThrottle, Throttle};
use crate::storage::{asset_href, snapshot_id_at, MetadataEntry, MetadataStore, SnapshotDir};
use crate::url::{extract_hostname, normalize_page_url, resolve_asset_url};
use crate::{Result, SnapError, UrlError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Save path reserved for the seed page
const SEED_SAVE_PATH: &str = "index.html";

/// Live counters for a running archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    /// Pages taken off the worklist and attempted
    pub pages_processed: u64,
    /// Assets successfully written to disk
    pub assets_downloaded: u64,
    pub current_page_url: Option<String>,
}

/// Receives progress snapshots while a run executes
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &CrawlProgress);
}

/// Reporter that discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _progress: &CrawlProgress) {}
}

/// A validated request to archive one host
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub seed: Url,
    pub hostname: String,
    pub max_pages: u32,
}

impl ArchiveRequest {
    pub fn new(seed: Url, max_pages: u32) -> Result<Self> {
        if max_pages == 0 {
            return Err(SnapError::Validation(
                "max pages must be at least 1".to_string(),
            ));
        }
        let hostname = extract_hostname(&seed).ok_or(UrlError::MissingHost)?;
        Ok(Self {
            seed,
            hostname,
            max_pages,
        })
    }
}

/// Outcome of a finished archive run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub hostname: String,
    pub snapshot_id: String,
    pub page_count: u64,
    pub asset_count: u64,
    pub snapshot_root: PathBuf,
}

/// Something that can run an archive request to completion
///
/// The job registry only talks to this trait, so runs can be faked in tests.
#[async_trait]
pub trait SiteArchiver: Send + Sync {
    async fn archive(
        &self,
        request: ArchiveRequest,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<ArchiveSummary>;
}

type ThrottleFactory = Arc<dyn Fn() -> Box<dyn Throttle> + Send + Sync>;

/// Archives sites into snapshot directories and records them in host metadata
#[derive(Clone)]
pub struct CrawlEngine {
    client: Client,
    settings: CrawlerConfig,
    classifier: Arc<ResourceClassifier>,
    metadata: MetadataStore,
    throttle_factory: ThrottleFactory,
}

impl CrawlEngine {
    /// Creates an engine from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Ready to archive
    /// * `Err(SnapError)` - The HTTP client or skip rules could not be built
    pub fn new(config: &Config) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let classifier = ResourceClassifier::from_config(&config.classifier)?;
        let pacing = config.crawler.clone();

        Ok(Self {
            client,
            settings: config.crawler.clone(),
            classifier: Arc::new(classifier),
            metadata: MetadataStore::new(&config.output.data_dir),
            throttle_factory: Arc::new(move || {
                Box::new(IntervalThrottle::from_config(&pacing)) as Box<dyn Throttle>
            }),
        })
    }

    /// Replaces the skip rules
    pub fn with_classifier(mut self, classifier: ResourceClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Replaces the pacing policy; `factory` is called once per run
    pub fn with_throttle<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Throttle> + Send + Sync + 'static,
    {
        self.throttle_factory = Arc::new(factory);
        self
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn data_root(&self) -> &Path {
        self.metadata.data_root()
    }

    pub fn settings(&self) -> &CrawlerConfig {
        &self.settings
    }

    /// Crawls the request's host into a new snapshot
    ///
    /// Does not touch the host's metadata log; see [`SiteArchiver::archive`].
    pub async fn crawl(
        &self,
        request: &ArchiveRequest,
        reporter: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let snapshot_id = snapshot_id_at(Utc::now());
        let snapshot = SnapshotDir::create(self.data_root(), &request.hostname, &snapshot_id).await?;

        tracing::info!(
            "Archiving {} into {} (budget {} pages)",
            request.seed,
            snapshot.root().display(),
            request.max_pages
        );

        let mut run = CrawlRun {
            engine: self,
            request,
            reporter,
            assets: AssetDownloader::new(
                self.client.clone(),
                Duration::from_secs(self.settings.asset_timeout_secs),
                snapshot.clone(),
            ),
            snapshot,
            throttle: (self.throttle_factory)(),
            progress: CrawlProgress::default(),
            visited: HashSet::new(),
            saved_paths: HashSet::new(),
        };
        Ok(run.execute().await)
    }
}

#[async_trait]
impl SiteArchiver for CrawlEngine {
    async fn archive(
        &self,
        request: ArchiveRequest,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<ArchiveSummary> {
        let summary = self.crawl(&request, reporter.as_ref()).await?;

        let entry = MetadataEntry {
            snapshot_id: summary.snapshot_id.clone(),
            source_url: request.seed.to_string(),
            asset_count: summary.asset_count,
            page_count: summary.page_count,
            created_at: Utc::now(),
        };
        self.metadata.record(&summary.hostname, entry).await?;

        Ok(summary)
    }
}

/// Mutable state of one archive run
struct CrawlRun<'a> {
    engine: &'a CrawlEngine,
    request: &'a ArchiveRequest,
    reporter: &'a dyn ProgressReporter,
    snapshot: SnapshotDir,
    assets: AssetDownloader,
    throttle: Box<dyn Throttle>,
    progress: CrawlProgress,
    /// Normalized keys of pages already taken off the worklist
    visited: HashSet<String>,
    saved_paths: HashSet<String>,
}

impl CrawlRun<'_> {
    async fn execute(&mut self) -> ArchiveSummary {
        let budget = self.request.max_pages as usize;
        let start_time = std::time::Instant::now();

        let seed = PageTask {
            key: normalize_page_url(self.request.seed.as_str()),
            url: self.request.seed.clone(),
            save_path: SEED_SAVE_PATH.to_string(),
        };
        let mut worklist = vec![seed];

        while let Some(task) = worklist.pop() {
            if self.visited.len() >= budget {
                tracing::debug!("Page budget of {} reached", budget);
                break;
            }
            if !self.visited.insert(task.key.clone()) {
                continue;
            }

            self.progress.pages_processed += 1;
            self.progress.current_page_url = Some(task.url.to_string());
            self.reporter.report(&self.progress);

            let children = self.process_page(task).await;

            // Reversed so the first link in the document is popped next
            for child in children.into_iter().rev() {
                if self.visited.len() >= budget {
                    break;
                }
                if !self.visited.contains(&child.key) {
                    worklist.push(child);
                }
            }
        }

        self.progress.current_page_url = None;
        self.reporter.report(&self.progress);

        tracing::info!(
            "Archived {}: {} pages, {} assets in {:.1}s",
            self.request.hostname,
            self.progress.pages_processed,
            self.progress.assets_downloaded,
            start_time.elapsed().as_secs_f64()
        );

        ArchiveSummary {
            hostname: self.request.hostname.clone(),
            snapshot_id: self.snapshot.snapshot_id().to_string(),
            page_count: self.progress.pages_processed,
            asset_count: self.progress.assets_downloaded,
            snapshot_root: self.snapshot.root().to_path_buf(),
        }
    }

    /// Fetches, rewrites and saves one page, returning its same-host links
    ///
    /// A page that cannot be fetched or saved yields no links.
    async fn process_page(&mut self, task: PageTask) -> Vec<PageTask> {
        let settings = &self.engine.settings;

        self.throttle.before_page().await;
        let fetched = fetch_url(
            &self.engine.client,
            task.url.as_str(),
            Duration::from_secs(settings.page_timeout_secs),
        )
        .await;

        let (final_url, content_type, body) = match fetched {
            FetchResult::Success {
                final_url,
                content_type,
                body,
                ..
            } => (final_url, content_type, body),
            failure => {
                tracing::warn!(
                    "Failed to fetch page {}: {}",
                    task.url,
                    failure.failure_reason().unwrap_or_default()
                );
                return Vec::new();
            }
        };

        let save_path = self.reserve_save_path(&task);

        if !is_html_content_type(&content_type) {
            match self.snapshot.write_page(&save_path, &body).await {
                Ok(_) => tracing::debug!("Saved non-HTML page {} -> {}", task.url, save_path),
                Err(e) => tracing::warn!("Failed to save page {} as {}: {}", task.url, save_path, e),
            }
            return Vec::new();
        }

        let html = String::from_utf8_lossy(&body).into_owned();
        let base = Url::parse(&final_url).unwrap_or_else(|_| task.url.clone());
        let parsed = parse_page(&html, &base, &self.request.hostname);

        let replacements = self.download_assets(&parsed.assets, &base, &save_path).await;

        let document = match rewrite_asset_refs(&html, task.url.as_str(), &replacements) {
            Ok((rewritten, count)) => {
                tracing::debug!("Rewrote {} asset references in {}", count, task.url);
                rewritten
            }
            Err(e) => {
                tracing::warn!("{}; saving page with original references", e);
                html
            }
        };

        if let Err(e) = self.snapshot.write_page(&save_path, document.as_bytes()).await {
            tracing::warn!("Failed to save page {} as {}: {}", task.url, save_path, e);
            return Vec::new();
        }

        tracing::info!(
            "Saved {} -> {}{}",
            task.url,
            save_path,
            parsed
                .title
                .as_deref()
                .map(|t| format!(" ({})", t))
                .unwrap_or_default()
        );

        parsed.links
    }

    /// Downloads the page's assets in document order
    ///
    /// Returns the local href for each (category, raw reference) pair that was
    /// saved. Failed downloads are logged and leave the reference as it was.
    async fn download_assets(
        &mut self,
        refs: &[AssetRef],
        base: &Url,
        save_path: &str,
    ) -> Replacements {
        let mut seen = HashSet::new();
        let mut replacements = Replacements::new();

        for asset in refs {
            if !seen.insert((asset.category, asset.raw.as_str())) {
                continue;
            }

            if let Some(rule) = self
                .engine
                .classifier
                .matching_rule(asset.category, &asset.raw)
            {
                tracing::debug!(
                    "Skipping {} {} (matched {})",
                    asset.category,
                    asset.raw,
                    rule.pattern.as_str()
                );
                continue;
            }

            let url = match resolve_asset_url(&asset.raw, base) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping {} {}: {}", asset.category, asset.raw, e);
                    continue;
                }
            };

            let cached = self.assets.saved_filename(&url).map(str::to_string);
            let filename = match cached {
                Some(existing) => existing,
                None => {
                    self.throttle.before_asset().await;
                    match self.assets.download(&url).await {
                        Ok(filename) => {
                            self.progress.assets_downloaded += 1;
                            self.reporter.report(&self.progress);
                            filename
                        }
                        Err(e) => {
                            tracing::warn!("Failed to download asset {}: {}", url, e);
                            continue;
                        }
                    }
                }
            };

            replacements.insert(
                (asset.category, asset.raw.clone()),
                asset_href(save_path, &filename),
            );
        }

        replacements
    }

    /// Claims a unique save path for the page
    ///
    /// Only the seed may be saved as `index.html` at the snapshot root, and two
    /// distinct pages never share a file.
    fn reserve_save_path(&mut self, task: &PageTask) -> String {
        // The seed is always the first page visited
        let is_seed = self.visited.len() == 1;
        let taken = self.saved_paths.contains(&task.save_path)
            || (!is_seed && task.save_path == SEED_SAVE_PATH);

        let path = if taken {
            disambiguate_save_path(&task.save_path, &task.key)
        } else {
            task.save_path.clone()
        };
        self.saved_paths.insert(path.clone());
        path
    }
}

fn disambiguate_save_path(save_path: &str, key: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    let stem = save_path.strip_suffix(".html").unwrap_or(save_path);
    format!("{}-{}.html", stem, &digest[..8])
}
