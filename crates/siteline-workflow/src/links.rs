//! Link administration
//!
//! Creating, reconfiguring, and deleting external project links. All of it
//! is admin-only. Deleting a link never deletes the records mirrored
//! through it; while records exist the deletion is refused outright.

use std::sync::Arc;

use siteline_audit::AuditLogger;
use siteline_core::domain::{
    ExternalId, ExternalProjectLink, LinkId, ProjectId, UserId, WorkflowError,
};
use siteline_core::ports::IRecordStore;

use crate::auth;

/// Editable link settings, as submitted by an admin
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub display_name: String,
    pub storage_folder_id: Option<String>,
    pub sync_rfis: bool,
    pub sync_submittals: bool,
    pub enabled: bool,
}

/// Admin operations over external project links
pub struct LinkAdmin {
    store: Arc<dyn IRecordStore>,
    audit: AuditLogger,
}

impl LinkAdmin {
    pub fn new(store: Arc<dyn IRecordStore>) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self { store, audit }
    }

    /// Creates a new link to an external project
    #[tracing::instrument(skip(self))]
    pub async fn create_link(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        external_project_id: &str,
        settings: LinkSettings,
    ) -> Result<ExternalProjectLink, WorkflowError> {
        self.require_link_admin(project_id, acting_user, "create_link")
            .await?;

        let external_project_id = ExternalId::new(external_project_id)?;
        let mut link = ExternalProjectLink::new(*project_id, settings.display_name.clone(), external_project_id);
        link.update_settings(
            settings.display_name,
            settings.storage_folder_id,
            settings.sync_rfis,
            settings.sync_submittals,
            settings.enabled,
        );
        self.store.save_link(&link).await?;

        tracing::info!(link_id = %link.id(), project_id = %project_id, "Link created");
        Ok(link)
    }

    /// Updates the editable settings of an existing link
    #[tracing::instrument(skip(self))]
    pub async fn update_link_settings(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        link_id: &LinkId,
        settings: LinkSettings,
    ) -> Result<ExternalProjectLink, WorkflowError> {
        self.require_link_admin(project_id, acting_user, "update_link_settings")
            .await?;

        let mut link = self.load_link(project_id, link_id).await?;
        link.update_settings(
            settings.display_name,
            settings.storage_folder_id,
            settings.sync_rfis,
            settings.sync_submittals,
            settings.enabled,
        );
        self.store.save_link(&link).await?;
        Ok(link)
    }

    /// Deletes a link, refusing while mirrored records still reference it
    #[tracing::instrument(skip(self))]
    pub async fn delete_link(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        link_id: &LinkId,
    ) -> Result<(), WorkflowError> {
        self.require_link_admin(project_id, acting_user, "delete_link")
            .await?;

        let link = self.load_link(project_id, link_id).await?;
        let record_count = self.store.count_records_for_link(link.id()).await?;
        if record_count > 0 {
            return Err(WorkflowError::Conflict(format!(
                "Link still has {record_count} mirrored records; disable it instead"
            )));
        }

        self.store.delete_link(link.id()).await?;
        tracing::info!(link_id = %link_id, project_id = %project_id, "Link deleted");
        Ok(())
    }

    /// Lists the project's links (any member)
    pub async fn list_links(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
    ) -> Result<Vec<ExternalProjectLink>, WorkflowError> {
        auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        Ok(self.store.list_links_for_project(project_id).await?)
    }

    /// Checks admin access, auditing the denial
    async fn require_link_admin(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        operation: &str,
    ) -> Result<(), WorkflowError> {
        let membership =
            auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        if let Err(denied) = auth::require_admin(&membership) {
            self.audit
                .log_permission_denied(
                    *acting_user,
                    None,
                    *project_id,
                    operation,
                    "requires the admin role",
                )
                .await;
            return Err(denied);
        }
        Ok(())
    }

    /// Loads a link and verifies it belongs to the given project
    async fn load_link(
        &self,
        project_id: &ProjectId,
        link_id: &LinkId,
    ) -> Result<ExternalProjectLink, WorkflowError> {
        let link = self
            .store
            .get_link(link_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Link {link_id} not found")))?;
        if link.project_id() != project_id {
            return Err(WorkflowError::NotFound(format!(
                "Link {link_id} not found in this project"
            )));
        }
        Ok(link)
    }
}
