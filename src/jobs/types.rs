//! Job domain types

use crate::crawler::{ArchiveSummary, CrawlProgress};
use crate::{Result, SnapError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque job identifier assigned at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = SnapError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SnapError::JobNotFound(s.to_string()))
    }
}

/// Job execution status
///
/// Transitions only move forward: pending → running → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the status may move to `next`
    ///
    /// A pending job may fail without ever running (e.g. the run could not start).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub hostname: String,
    pub snapshot_id: String,
    pub asset_count: u64,
    pub page_count: u64,
}

impl From<&ArchiveSummary> for JobResult {
    fn from(summary: &ArchiveSummary) -> Self {
        Self {
            hostname: summary.hostname.clone(),
            snapshot_id: summary.snapshot_id.clone(),
            asset_count: summary.asset_count,
            page_count: summary.page_count,
        }
    }
}

/// One archive run as seen by callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub target_url: String,
    pub hostname: String,
    pub status: JobStatus,
    pub max_pages: u32,
    pub progress: CrawlProgress,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Present only when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Creates a pending job
    pub fn new(id: JobId, target_url: String, hostname: String, max_pages: u32) -> Self {
        Self {
            id,
            target_url,
            hostname,
            status: JobStatus::Pending,
            max_pages,
            progress: CrawlProgress::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SnapError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self, result: JobResult) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.progress.current_page_url = None;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: String) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.progress.current_page_url = None;
        self.error = Some(error);
        Ok(())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            url: self.target_url.clone(),
            hostname: self.hostname.clone(),
            status: self.status,
            progress: self.progress.clone(),
        }
    }
}

/// Compact listing row for active jobs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub url: String,
    pub hostname: String,
    pub status: JobStatus,
    pub progress: CrawlProgress,
}
