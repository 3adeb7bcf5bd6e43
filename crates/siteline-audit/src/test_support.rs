//! Shared in-memory store mocks for the audit and history tests

use std::sync::Mutex;

use async_trait::async_trait;
use siteline_core::domain::{
    AuditEntry, ExternalProjectLink, ExternalRecord, LinkId, Project, ProjectId,
    ProjectMembership, RecordId, RecordPatch, RunId, RunLog, StatusHistoryEntry, SyncCursor,
    SyncModule, UserId,
};
use siteline_core::ports::IRecordStore;

/// Records appended audit/history entries; everything else is a no-op
pub struct MockStore {
    pub audit: Mutex<Vec<AuditEntry>>,
    pub history: Mutex<Vec<StatusHistoryEntry>>,
    /// When set, append operations fail
    pub fail_appends: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            audit: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            fail_appends: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_appends: true,
            ..Self::new()
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().unwrap().clone()
    }

    pub fn history_entries(&self) -> Vec<StatusHistoryEntry> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl IRecordStore for MockStore {
    async fn save_link(&self, _link: &ExternalProjectLink) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_link(&self, _id: &LinkId) -> anyhow::Result<Option<ExternalProjectLink>> {
        Ok(None)
    }
    async fn list_links_for_project(
        &self,
        _project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ExternalProjectLink>> {
        Ok(vec![])
    }
    async fn delete_link(&self, _id: &LinkId) -> anyhow::Result<()> {
        Ok(())
    }
    async fn count_records_for_link(&self, _id: &LinkId) -> anyhow::Result<u64> {
        Ok(0)
    }
    async fn insert_record(&self, _record: &ExternalRecord) -> anyhow::Result<()> {
        Ok(())
    }
    async fn save_record(&self, _record: &ExternalRecord) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_record(
        &self,
        _id: &RecordId,
        _module: SyncModule,
    ) -> anyhow::Result<Option<ExternalRecord>> {
        Ok(None)
    }
    async fn find_record(
        &self,
        _link_id: &LinkId,
        _module: SyncModule,
        _external_id: &str,
    ) -> anyhow::Result<Option<ExternalRecord>> {
        Ok(None)
    }
    async fn apply_patch(
        &self,
        _id: &RecordId,
        _module: SyncModule,
        _patch: &RecordPatch,
    ) -> anyhow::Result<()> {
        Ok(())
    }
    async fn list_pending_manual_responses(
        &self,
        _project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ExternalRecord>> {
        Ok(vec![])
    }
    async fn save_run_log(&self, _log: &RunLog) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_run_log(&self, _id: &RunId) -> anyhow::Result<Option<RunLog>> {
        Ok(None)
    }
    async fn get_cursor(
        &self,
        _project_id: &ProjectId,
        _module: SyncModule,
    ) -> anyhow::Result<Option<SyncCursor>> {
        Ok(None)
    }
    async fn save_cursor(&self, _cursor: &SyncCursor) -> anyhow::Result<()> {
        Ok(())
    }
    async fn append_audit(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        if self.fail_appends {
            anyhow::bail!("Database write error");
        }
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }
    async fn get_audit_trail(&self, _record_id: &RecordId) -> anyhow::Result<Vec<AuditEntry>> {
        Ok(vec![])
    }
    async fn append_history(&self, entry: &StatusHistoryEntry) -> anyhow::Result<()> {
        if self.fail_appends {
            anyhow::bail!("Database write error");
        }
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }
    async fn get_history(
        &self,
        _record_id: &RecordId,
    ) -> anyhow::Result<Vec<StatusHistoryEntry>> {
        Ok(vec![])
    }
    async fn save_project(&self, _project: &Project) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_project(&self, _id: &ProjectId) -> anyhow::Result<Option<Project>> {
        Ok(None)
    }
    async fn list_sync_enabled_projects(&self) -> anyhow::Result<Vec<Project>> {
        Ok(vec![])
    }
    async fn save_membership(&self, _membership: &ProjectMembership) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_membership(
        &self,
        _project_id: &ProjectId,
        _user_id: &UserId,
    ) -> anyhow::Result<Option<ProjectMembership>> {
        Ok(None)
    }
}
