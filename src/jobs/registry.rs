//! In-process registry of archive jobs
//!
//! Jobs live in the active map from submission until they reach a terminal
//! state, then move to the history map where they no longer change.

use crate::crawler::{ArchiveRequest, CrawlProgress, ProgressReporter, SiteArchiver};
use crate::jobs::types::{Job, JobId, JobResult, JobStatus, JobSummary};
use crate::url::parse_seed_url;
use crate::{Result, SnapError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Tracks submitted jobs and runs them on the ambient tokio runtime
///
/// Cloning is cheap; clones share the same job maps.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    active: RwLock<HashMap<JobId, Job>>,
    history: RwLock<HashMap<JobId, Job>>,
    archiver: Arc<dyn SiteArchiver>,
    default_max_pages: u32,
}

impl JobRegistry {
    pub fn new(archiver: Arc<dyn SiteArchiver>, default_max_pages: u32) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                active: RwLock::new(HashMap::new()),
                history: RwLock::new(HashMap::new()),
                archiver,
                default_max_pages,
            }),
        }
    }

    /// Validates the request, records a pending job and starts it in the background
    ///
    /// Invalid input is rejected before any job exists. Must be called from
    /// within a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(JobId)` - The job was created and scheduled
    /// * `Err(SnapError::Validation)` - The URL or page budget was rejected
    pub fn submit(&self, target_url: &str, max_pages: Option<u32>) -> Result<JobId> {
        let seed =
            parse_seed_url(target_url).map_err(|e| SnapError::Validation(e.to_string()))?;
        let max_pages = max_pages.unwrap_or(self.inner.default_max_pages);
        let request = ArchiveRequest::new(seed, max_pages).map_err(|e| match e {
            SnapError::Validation(_) => e,
            other => SnapError::Validation(other.to_string()),
        })?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SnapError::Runtime(e.to_string()))?;

        let id = JobId::new();
        let job = Job::new(
            id,
            target_url.trim().to_string(),
            request.hostname.clone(),
            max_pages,
        );
        write_lock(&self.inner.active).insert(id, job);

        tracing::info!(
            "Submitted job {} for {} (max {} pages)",
            id,
            request.seed,
            max_pages
        );

        runtime.spawn(run_job(Arc::clone(&self.inner), id, request));
        Ok(id)
    }

    /// Returns a snapshot of the job, looking in active jobs first
    pub fn get_status(&self, id: &JobId) -> Result<Job> {
        if let Some(job) = read_lock(&self.inner.active).get(id) {
            return Ok(job.clone());
        }
        read_lock(&self.inner.history)
            .get(id)
            .cloned()
            .ok_or_else(|| SnapError::JobNotFound(id.to_string()))
    }

    /// Jobs not yet finished, oldest first
    pub fn list_active(&self) -> Vec<JobSummary> {
        let active = read_lock(&self.inner.active);
        let mut jobs: Vec<&Job> = active.values().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs.into_iter().map(Job::summary).collect()
    }

    /// Finished jobs, oldest first
    pub fn list_history(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = read_lock(&self.inner.history).values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Polls until the job reaches a terminal state
    pub async fn wait_for(&self, id: &JobId, poll_interval: Duration) -> Result<Job> {
        loop {
            let job = self.get_status(id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl RegistryInner {
    /// Applies a state change to an active job, logging rejected transitions
    fn update<F>(&self, id: JobId, change: F) -> bool
    where
        F: FnOnce(&mut Job) -> Result<()>,
    {
        let mut active = write_lock(&self.active);
        match active.get_mut(&id) {
            Some(job) => match change(job) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Job {}: {}", id, e);
                    false
                }
            },
            None => {
                tracing::warn!("Job {} is no longer active", id);
                false
            }
        }
    }

    /// Moves a terminal job from active to history
    ///
    /// Both maps are held for the move so a concurrent lookup always finds the job.
    fn retire(&self, id: JobId) {
        let mut active = write_lock(&self.active);
        let mut history = write_lock(&self.history);
        if let Some(job) = active.remove(&id) {
            history.insert(id, job);
        }
    }
}

/// Writes a running job's progress back into the registry
struct JobProgressHandle {
    inner: Arc<RegistryInner>,
    id: JobId,
}

impl ProgressReporter for JobProgressHandle {
    fn report(&self, progress: &CrawlProgress) {
        let mut active = write_lock(&self.inner.active);
        if let Some(job) = active.get_mut(&self.id) {
            if job.status == JobStatus::Running {
                job.progress = progress.clone();
            }
        }
    }
}

async fn run_job(inner: Arc<RegistryInner>, id: JobId, request: ArchiveRequest) {
    if !inner.update(id, Job::mark_running) {
        return;
    }
    tracing::debug!("Job {} running", id);

    let reporter: Arc<dyn ProgressReporter> = Arc::new(JobProgressHandle {
        inner: Arc::clone(&inner),
        id,
    });
    let archiver = Arc::clone(&inner.archiver);

    // Run in its own task so a panic fails the job instead of losing it
    let outcome = tokio::spawn(async move { archiver.archive(request, reporter).await }).await;

    match outcome {
        Ok(Ok(summary)) => {
            tracing::info!(
                "Job {} completed: {} pages, {} assets in snapshot {}",
                id,
                summary.page_count,
                summary.asset_count,
                summary.snapshot_id
            );
            inner.update(id, |job| job.complete(JobResult::from(&summary)));
        }
        Ok(Err(e)) => {
            tracing::error!("Job {} failed: {}", id, e);
            inner.update(id, |job| job.fail(e.to_string()));
        }
        Err(e) => {
            tracing::error!("Job {} aborted: {}", id, e);
            inner.update(id, |job| job.fail(format!("archive task aborted: {}", e)));
        }
    }

    inner.retire(id);
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
