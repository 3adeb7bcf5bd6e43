//! Record store port
//!
//! Persistence interface for everything Siteline keeps locally: links,
//! mirrored records, run logs, cursors, audit/history trails, projects,
//! and memberships. The SQLite adapter in `siteline-store` implements it.
//!
//! Record writes come in two shapes. Workflow code loads a record, mutates
//! it through its domain methods, and saves it whole with `save_record`.
//! Sync never saves whole records: it submits a [`RecordPatch`], whose
//! variants cover only the sync-writable fields, through `apply_patch`.

use async_trait::async_trait;

use crate::domain::{
    AuditEntry, ExternalProjectLink, ExternalRecord, LinkId, Project, ProjectId,
    ProjectMembership, RecordId, RecordPatch, RunId, RunLog, StatusHistoryEntry, SyncCursor,
    SyncModule, UserId,
};

/// Port: local persistence for Siteline state
#[async_trait]
pub trait IRecordStore: Send + Sync {
    // --- Links ---

    /// Inserts or updates a link
    async fn save_link(&self, link: &ExternalProjectLink) -> anyhow::Result<()>;

    /// Fetches a link by id
    async fn get_link(&self, id: &LinkId) -> anyhow::Result<Option<ExternalProjectLink>>;

    /// Lists all links of one project
    async fn list_links_for_project(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ExternalProjectLink>>;

    /// Deletes a link; mirrored records are left in place
    async fn delete_link(&self, id: &LinkId) -> anyhow::Result<()>;

    /// Counts mirrored records (both modules) belonging to a link
    async fn count_records_for_link(&self, id: &LinkId) -> anyhow::Result<u64>;

    // --- Records ---

    /// Inserts a newly mirrored record
    async fn insert_record(&self, record: &ExternalRecord) -> anyhow::Result<()>;

    /// Saves a whole record (workflow writes)
    async fn save_record(&self, record: &ExternalRecord) -> anyhow::Result<()>;

    /// Fetches a record by id, searching the module's collection
    async fn get_record(
        &self,
        id: &RecordId,
        module: SyncModule,
    ) -> anyhow::Result<Option<ExternalRecord>>;

    /// Fetches a record by its (link, module, external id) identity
    async fn find_record(
        &self,
        link_id: &LinkId,
        module: SyncModule,
        external_id: &str,
    ) -> anyhow::Result<Option<ExternalRecord>>;

    /// Applies a sync patch atomically (sync writes)
    async fn apply_patch(
        &self,
        id: &RecordId,
        module: SyncModule,
        patch: &RecordPatch,
    ) -> anyhow::Result<()>;

    /// Lists records with a detected, unconfirmed manual response in one
    /// project, newest detection first
    async fn list_pending_manual_responses(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ExternalRecord>>;

    // --- Run logs and cursors ---

    /// Inserts or updates a run log
    async fn save_run_log(&self, log: &RunLog) -> anyhow::Result<()>;

    /// Fetches a run log by id
    async fn get_run_log(&self, id: &RunId) -> anyhow::Result<Option<RunLog>>;

    /// Fetches the sync cursor for one (project, module)
    async fn get_cursor(
        &self,
        project_id: &ProjectId,
        module: SyncModule,
    ) -> anyhow::Result<Option<SyncCursor>>;

    /// Inserts or updates a sync cursor
    async fn save_cursor(&self, cursor: &SyncCursor) -> anyhow::Result<()>;

    // --- Audit and history ---

    /// Appends an audit entry
    async fn append_audit(&self, entry: &AuditEntry) -> anyhow::Result<()>;

    /// Lists the audit trail for one record, oldest first
    async fn get_audit_trail(&self, record_id: &RecordId) -> anyhow::Result<Vec<AuditEntry>>;

    /// Appends a status-history entry
    async fn append_history(&self, entry: &StatusHistoryEntry) -> anyhow::Result<()>;

    /// Lists the status history for one record, oldest first
    async fn get_history(&self, record_id: &RecordId)
        -> anyhow::Result<Vec<StatusHistoryEntry>>;

    // --- Projects and memberships ---

    /// Inserts or updates a project
    async fn save_project(&self, project: &Project) -> anyhow::Result<()>;

    /// Fetches a project by id
    async fn get_project(&self, id: &ProjectId) -> anyhow::Result<Option<Project>>;

    /// Lists projects with sync enabled
    async fn list_sync_enabled_projects(&self) -> anyhow::Result<Vec<Project>>;

    /// Inserts or updates a membership
    async fn save_membership(&self, membership: &ProjectMembership) -> anyhow::Result<()>;

    /// Fetches one user's membership in one project
    async fn get_membership(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> anyhow::Result<Option<ProjectMembership>>;
}
