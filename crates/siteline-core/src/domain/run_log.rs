//! Sync run logs and cursors
//!
//! Every sync pass over one (link, module) pair produces a [`RunLog`] with
//! counters and collected per-item errors. A [`SyncCursor`] per
//! (project, module) remembers when the last successful run completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::newtypes::{LinkId, ProjectId, RunId};
use super::record::SyncModule;

/// What initiated a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Fired by the polling scheduler
    Scheduled,
    /// Requested explicitly by a user
    Manual,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTrigger::Scheduled => write!(f, "scheduled"),
            SyncTrigger::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for SyncTrigger {
    type Err = super::errors::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(SyncTrigger::Scheduled),
            "manual" => Ok(SyncTrigger::Manual),
            other => Err(super::errors::DomainError::ValidationFailed(format!(
                "Unknown sync trigger: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run is in progress
    Started,
    /// The run finished; per-item errors may still be recorded
    Completed,
    /// The run aborted before completing (listing failure etc.)
    Failed(String),
}

impl RunStatus {
    /// Stable name without the failure detail
    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Completed => "completed",
            RunStatus::Failed(_) => "failed",
        }
    }
}

/// Log of one sync pass over a (link, module) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    id: RunId,
    project_id: ProjectId,
    link_id: LinkId,
    module: SyncModule,
    trigger: SyncTrigger,
    status: RunStatus,
    items_processed: u32,
    items_created: u32,
    items_updated: u32,
    errors: Vec<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_ms: Option<u64>,
}

impl RunLog {
    /// Starts a new run log stamped with the current time
    pub fn start(
        project_id: ProjectId,
        link_id: LinkId,
        module: SyncModule,
        trigger: SyncTrigger,
    ) -> Self {
        Self {
            id: RunId::new(),
            project_id,
            link_id,
            module,
            trigger,
            status: RunStatus::Started,
            items_processed: 0,
            items_created: 0,
            items_updated: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Reconstructs a run log from its persisted parts
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: RunId,
        project_id: ProjectId,
        link_id: LinkId,
        module: SyncModule,
        trigger: SyncTrigger,
        status: RunStatus,
        items_processed: u32,
        items_created: u32,
        items_updated: u32,
        errors: Vec<String>,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            id,
            project_id,
            link_id,
            module,
            trigger,
            status,
            items_processed,
            items_created,
            items_updated,
            errors,
            started_at,
            completed_at,
            duration_ms,
        }
    }

    // --- Getters ---

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn link_id(&self) -> &LinkId {
        &self.link_id
    }

    pub fn module(&self) -> SyncModule {
        self.module
    }

    pub fn trigger(&self) -> SyncTrigger {
        self.trigger
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn items_processed(&self) -> u32 {
        self.items_processed
    }

    pub fn items_created(&self) -> u32 {
        self.items_created
    }

    pub fn items_updated(&self) -> u32 {
        self.items_updated
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    // --- Mutations ---

    /// Counts one processed item
    pub fn item_processed(&mut self) {
        self.items_processed += 1;
    }

    /// Counts one newly mirrored record
    pub fn item_created(&mut self) {
        self.items_created += 1;
    }

    /// Counts one updated record
    pub fn item_updated(&mut self) {
        self.items_updated += 1;
    }

    /// Records a per-item error; the run keeps going
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Marks the run completed and stamps its duration
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        self.completed_at = Some(now);
        self.status = RunStatus::Completed;
    }

    /// Marks the run failed with the aborting error
    pub fn fail(&mut self, error: impl Into<String>) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        self.completed_at = Some(now);
        self.status = RunStatus::Failed(error.into());
    }
}

/// High-water mark per (project, module)
///
/// The cursor value is the RFC 3339 completion time of the last successful
/// run. It is advanced only after a run completes, so an aborted run is
/// naturally retried from the previous position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub project_id: ProjectId,
    pub module: SyncModule,
    pub cursor: String,
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    /// Creates a cursor positioned at the given completion time
    pub fn at(project_id: ProjectId, module: SyncModule, completed_at: DateTime<Utc>) -> Self {
        Self {
            project_id,
            module,
            cursor: completed_at.to_rfc3339(),
            updated_at: completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_lifecycle() {
        let mut log = RunLog::start(
            ProjectId::new(),
            LinkId::new(),
            SyncModule::Rfi,
            SyncTrigger::Scheduled,
        );
        assert_eq!(log.status(), &RunStatus::Started);
        assert!(log.completed_at().is_none());

        log.item_processed();
        log.item_created();
        log.item_processed();
        log.item_updated();
        log.record_error("item RFI-3: bad payload");

        log.complete();
        assert_eq!(log.status(), &RunStatus::Completed);
        assert_eq!(log.items_processed(), 2);
        assert_eq!(log.items_created(), 1);
        assert_eq!(log.items_updated(), 1);
        assert_eq!(log.errors().len(), 1);
        assert!(log.completed_at().is_some());
        assert!(log.duration_ms().is_some());
    }

    #[test]
    fn test_run_log_failure() {
        let mut log = RunLog::start(
            ProjectId::new(),
            LinkId::new(),
            SyncModule::Submittal,
            SyncTrigger::Manual,
        );
        log.fail("listing failed: 503");
        assert!(matches!(log.status(), RunStatus::Failed(msg) if msg.contains("503")));
        assert_eq!(log.status().name(), "failed");
        assert!(log.completed_at().is_some());
    }

    #[test]
    fn test_cursor_value_is_rfc3339() {
        let completed = Utc::now();
        let cursor = SyncCursor::at(ProjectId::new(), SyncModule::Rfi, completed);
        let parsed = DateTime::parse_from_rfc3339(&cursor.cursor).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), completed);
    }
}
