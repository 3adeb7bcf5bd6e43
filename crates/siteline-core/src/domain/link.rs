//! External project link entity
//!
//! An `ExternalProjectLink` connects one internal project to one project on
//! the external construction platform, with per-module sync toggles. A
//! single internal project may carry several links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::newtypes::{ExternalId, LinkId, ProjectId};
use super::record::SyncModule;

/// Outcome of the most recent sync run over a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRunStatus {
    Ok,
    Failed,
}

impl fmt::Display for LinkRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRunStatus::Ok => write!(f, "ok"),
            LinkRunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for LinkRunStatus {
    type Err = super::errors::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(LinkRunStatus::Ok),
            "failed" => Ok(LinkRunStatus::Failed),
            other => Err(super::errors::DomainError::ValidationFailed(format!(
                "Unknown link run status: {other}"
            ))),
        }
    }
}

/// A connection between an internal project and an external platform project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProjectLink {
    /// Unique identifier
    id: LinkId,
    /// The internal project this link belongs to
    project_id: ProjectId,
    /// Human-readable name shown in link listings
    display_name: String,
    /// The platform's identifier for the linked project
    external_project_id: ExternalId,
    /// Optional platform folder used for response attachments
    storage_folder_id: Option<String>,
    /// Whether RFIs are synced over this link
    sync_rfis: bool,
    /// Whether submittals are synced over this link
    sync_submittals: bool,
    /// Master switch; disabled links are skipped entirely
    enabled: bool,
    /// Outcome of the most recent run, if any
    last_run_status: Option<LinkRunStatus>,
    /// Error text of the most recent failed run
    last_run_error: Option<String>,
    /// When the most recent run finished
    last_run_at: Option<DateTime<Utc>>,
    /// When the link was created
    created_at: DateTime<Utc>,
}

impl ExternalProjectLink {
    /// Creates a new enabled link with both modules switched on
    pub fn new(
        project_id: ProjectId,
        display_name: impl Into<String>,
        external_project_id: ExternalId,
    ) -> Self {
        Self {
            id: LinkId::new(),
            project_id,
            display_name: display_name.into(),
            external_project_id,
            storage_folder_id: None,
            sync_rfis: true,
            sync_submittals: true,
            enabled: true,
            last_run_status: None,
            last_run_error: None,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }

    /// Reconstructs a link from its persisted parts
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: LinkId,
        project_id: ProjectId,
        display_name: String,
        external_project_id: ExternalId,
        storage_folder_id: Option<String>,
        sync_rfis: bool,
        sync_submittals: bool,
        enabled: bool,
        last_run_status: Option<LinkRunStatus>,
        last_run_error: Option<String>,
        last_run_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            display_name,
            external_project_id,
            storage_folder_id,
            sync_rfis,
            sync_submittals,
            enabled,
            last_run_status,
            last_run_error,
            last_run_at,
            created_at,
        }
    }

    /// Builder: sets the attachment storage folder
    #[must_use]
    pub fn with_storage_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.storage_folder_id = Some(folder_id.into());
        self
    }

    /// Builder: sets the per-module toggles
    #[must_use]
    pub fn with_modules(mut self, sync_rfis: bool, sync_submittals: bool) -> Self {
        self.sync_rfis = sync_rfis;
        self.sync_submittals = sync_submittals;
        self
    }

    // --- Getters ---

    pub fn id(&self) -> &LinkId {
        &self.id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn external_project_id(&self) -> &ExternalId {
        &self.external_project_id
    }

    pub fn storage_folder_id(&self) -> Option<&str> {
        self.storage_folder_id.as_deref()
    }

    pub fn sync_rfis(&self) -> bool {
        self.sync_rfis
    }

    pub fn sync_submittals(&self) -> bool {
        self.sync_submittals
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_run_status(&self) -> Option<LinkRunStatus> {
        self.last_run_status
    }

    pub fn last_run_error(&self) -> Option<&str> {
        self.last_run_error.as_deref()
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the given module is enabled on this link
    pub fn syncs_module(&self, module: SyncModule) -> bool {
        match module {
            SyncModule::Rfi => self.sync_rfis,
            SyncModule::Submittal => self.sync_submittals,
        }
    }

    /// Returns the modules enabled on this link, in sync order
    pub fn enabled_modules(&self) -> Vec<SyncModule> {
        let mut modules = Vec::with_capacity(2);
        if self.sync_rfis {
            modules.push(SyncModule::Rfi);
        }
        if self.sync_submittals {
            modules.push(SyncModule::Submittal);
        }
        modules
    }

    // --- Mutations ---

    /// Records the outcome of a sync run over this link
    pub fn record_run_outcome(
        &mut self,
        status: LinkRunStatus,
        error: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.last_run_status = Some(status);
        self.last_run_error = error;
        self.last_run_at = Some(at);
    }

    /// Updates the editable link settings
    pub fn update_settings(
        &mut self,
        display_name: impl Into<String>,
        storage_folder_id: Option<String>,
        sync_rfis: bool,
        sync_submittals: bool,
        enabled: bool,
    ) {
        self.display_name = display_name.into();
        self.storage_folder_id = storage_folder_id;
        self.sync_rfis = sync_rfis;
        self.sync_submittals = sync_submittals;
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_link() -> ExternalProjectLink {
        ExternalProjectLink::new(
            ProjectId::new(),
            "Main campus",
            ExternalId::new("acc-proj-1").unwrap(),
        )
    }

    #[test]
    fn test_new_link_defaults() {
        let link = sample_link();
        assert!(link.enabled());
        assert!(link.sync_rfis());
        assert!(link.sync_submittals());
        assert!(link.last_run_status().is_none());
        assert_eq!(
            link.enabled_modules(),
            vec![SyncModule::Rfi, SyncModule::Submittal]
        );
    }

    #[test]
    fn test_module_toggles() {
        let link = sample_link().with_modules(false, true);
        assert!(!link.syncs_module(SyncModule::Rfi));
        assert!(link.syncs_module(SyncModule::Submittal));
        assert_eq!(link.enabled_modules(), vec![SyncModule::Submittal]);
    }

    #[test]
    fn test_record_run_outcome() {
        let mut link = sample_link();
        let at = Utc::now();
        link.record_run_outcome(LinkRunStatus::Failed, Some("timeout".to_string()), at);
        assert_eq!(link.last_run_status(), Some(LinkRunStatus::Failed));
        assert_eq!(link.last_run_error(), Some("timeout"));
        assert_eq!(link.last_run_at(), Some(at));

        link.record_run_outcome(LinkRunStatus::Ok, None, Utc::now());
        assert_eq!(link.last_run_status(), Some(LinkRunStatus::Ok));
        assert!(link.last_run_error().is_none());
    }
}
