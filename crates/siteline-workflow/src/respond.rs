//! Response dispatch and manual-response confirmation
//!
//! `send_response` pushes the official response to the external platform:
//! status update, response text, then attachments staged on the internal
//! file share. The local record only moves to `SentToAcc` after every
//! external call succeeded; a failure partway through leaves the record
//! untouched so the dispatch can be retried.
//!
//! `confirm_manual_response` acknowledges a response someone entered
//! directly on the platform. It copies the captured status/text into the
//! local response fields and force-closes the record. Both operations are
//! open to project admins and to members holding the explicit send grant.
//!
//! Dispatch is single-flight per record: a second call while one is in
//! progress fails fast with a conflict instead of double-posting.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use siteline_audit::{AuditLogger, HistoryRecorder};
use siteline_core::domain::{
    Actor, ExternalProjectLink, ExternalRecord, HistoryField, ManualResponsePayload, ProjectId,
    RecordId, ReviewStatus, SyncModule, UserId, WorkflowError,
};
use siteline_core::ports::{IConstructionPlatform, IFileShare, IRecordStore};

use crate::auth;

/// Dispatches official responses and confirms manual ones
pub struct ResponseDispatcher {
    platform: Arc<dyn IConstructionPlatform>,
    store: Arc<dyn IRecordStore>,
    files: Arc<dyn IFileShare>,
    audit: AuditLogger,
    history: HistoryRecorder,
    guards: DashMap<RecordId, Arc<Mutex<()>>>,
}

impl ResponseDispatcher {
    pub fn new(
        platform: Arc<dyn IConstructionPlatform>,
        store: Arc<dyn IRecordStore>,
        files: Arc<dyn IFileShare>,
    ) -> Self {
        let audit = AuditLogger::new(store.clone());
        let history = HistoryRecorder::new(store.clone());
        Self {
            platform,
            store,
            files,
            audit,
            history,
            guards: DashMap::new(),
        }
    }

    /// Sends the official response for one record to the external platform
    ///
    /// Allowed for project admins and for members carrying the explicit
    /// send grant. Side effects run in a fixed order (status, text,
    /// attachments) and any failure aborts the dispatch with the record
    /// unchanged.
    #[tracing::instrument(skip(self, response_text, file_paths))]
    pub async fn send_response(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        record_id: &RecordId,
        module: SyncModule,
        response_status: &str,
        response_text: &str,
        file_paths: &[String],
    ) -> Result<ExternalRecord, WorkflowError> {
        self.require_send_permission(project_id, acting_user, record_id, "send_response")
            .await?;

        if response_status.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "Response status must not be empty".to_string(),
            ));
        }
        if response_text.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "Response text must not be empty".to_string(),
            ));
        }
        if file_paths.is_empty() {
            return Err(WorkflowError::Validation(
                "At least one response file must be selected".to_string(),
            ));
        }

        let guard = self.guards.entry(*record_id).or_default().clone();
        let Ok(_lock) = guard.try_lock() else {
            return Err(WorkflowError::Conflict(
                "A response dispatch for this record is already in progress".to_string(),
            ));
        };

        let mut record = self.load_record(record_id, module).await?;
        let link = self
            .store
            .get_link(record.link_id())
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("Link {} not found", record.link_id()))
            })?;
        let previous = record.review().status;

        self.push_to_platform(
            &link,
            &record,
            acting_user,
            project_id,
            response_status,
            response_text,
            file_paths,
        )
        .await?;

        // All external calls succeeded; only now does local state move.
        record.mark_response_sent(response_status, response_text, *acting_user, Utc::now())?;
        self.store.save_record(&record).await?;

        let file_names: Vec<String> = file_paths.iter().map(|p| base_name(p).to_string()).collect();
        self.audit
            .log_response_sent(
                *acting_user,
                *record_id,
                *project_id,
                response_status,
                &file_names,
            )
            .await;
        self.history
            .record_transition(
                *record_id,
                HistoryField::InternalStatus,
                Some(previous.name().to_string()),
                ReviewStatus::SentToAcc.name(),
                Actor::User(*acting_user),
            )
            .await;
        self.history
            .record_transition(
                *record_id,
                HistoryField::ResponseStatus,
                None,
                response_status,
                Actor::User(*acting_user),
            )
            .await;

        Ok(record)
    }

    /// Runs the external side effects in order, auditing the failing step
    #[allow(clippy::too_many_arguments)]
    async fn push_to_platform(
        &self,
        link: &ExternalProjectLink,
        record: &ExternalRecord,
        acting_user: &UserId,
        project_id: &ProjectId,
        response_status: &str,
        response_text: &str,
        file_paths: &[String],
    ) -> Result<(), WorkflowError> {
        let external_id = record.external_id().as_str();
        let module = record.module();

        if let Err(e) = self
            .platform
            .update_status(link, module, external_id, response_status)
            .await
        {
            return Err(self
                .dispatch_failed(acting_user, record, project_id, "update_status", e)
                .await);
        }

        if let Err(e) = self
            .platform
            .post_response(link, module, external_id, response_text)
            .await
        {
            return Err(self
                .dispatch_failed(acting_user, record, project_id, "post_response", e)
                .await);
        }

        for path in file_paths {
            let bytes = match self.files.read_file_bytes(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    return Err(self
                        .dispatch_failed(acting_user, record, project_id, "read_file", e)
                        .await);
                }
            };
            if let Err(e) = self
                .platform
                .upload_attachment(link, module, external_id, base_name(path), bytes)
                .await
            {
                return Err(self
                    .dispatch_failed(acting_user, record, project_id, "upload_attachment", e)
                    .await);
            }
        }

        Ok(())
    }

    /// Audits a failed dispatch step and produces the external error
    async fn dispatch_failed(
        &self,
        acting_user: &UserId,
        record: &ExternalRecord,
        project_id: &ProjectId,
        step: &str,
        error: anyhow::Error,
    ) -> WorkflowError {
        tracing::error!(
            record_id = %record.id(),
            step,
            error = %error,
            "Response dispatch failed, record left unchanged"
        );
        self.audit
            .log_response_send_failed(
                *acting_user,
                *record.id(),
                *project_id,
                step,
                &error.to_string(),
            )
            .await;
        WorkflowError::External(format!("{step} failed: {error}"))
    }

    /// Confirms a manually entered platform response
    ///
    /// Same permission rule as dispatch. Copies the captured status/text
    /// into the local response fields and force-closes the record.
    /// Confirming twice, or confirming a record without a pending
    /// detection, is a conflict.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_manual_response(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        record_id: &RecordId,
        module: SyncModule,
    ) -> Result<ExternalRecord, WorkflowError> {
        self.require_send_permission(project_id, acting_user, record_id, "confirm_manual_response")
            .await?;

        // Same per-record guard as dispatch: the pending check below is
        // check-then-act across awaits, so overlapping confirmations must
        // fail fast instead of both passing it.
        let guard = self.guards.entry(*record_id).or_default().clone();
        let Ok(_lock) = guard.try_lock() else {
            return Err(WorkflowError::Conflict(
                "A dispatch or confirmation for this record is already in progress".to_string(),
            ));
        };

        let mut record = self.load_record(record_id, module).await?;
        if !record.has_pending_manual_response() {
            return Err(WorkflowError::Conflict(
                "Record has no pending manual response".to_string(),
            ));
        }
        let payload_json = record
            .sync()
            .manual_response_payload
            .clone()
            .ok_or_else(|| {
                WorkflowError::DataCorruption(
                    "Manual response flagged but no payload captured".to_string(),
                )
            })?;
        let payload = ManualResponsePayload::from_json(&payload_json)
            .map_err(|e| WorkflowError::DataCorruption(e.to_string()))?;

        let previous = record.review().status;
        record.apply_manual_confirmation(&payload, *acting_user, Utc::now())?;
        self.store.save_record(&record).await?;

        self.audit
            .log_manual_response_confirmed(
                *acting_user,
                *record_id,
                *project_id,
                payload.status.as_deref(),
            )
            .await;
        self.history
            .record_transition(
                *record_id,
                HistoryField::InternalStatus,
                Some(previous.name().to_string()),
                ReviewStatus::Closed.name(),
                Actor::User(*acting_user),
            )
            .await;

        Ok(record)
    }

    /// Lists the project's records awaiting manual-response confirmation
    pub async fn list_pending_manual_responses(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
    ) -> Result<Vec<ExternalRecord>, WorkflowError> {
        auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        Ok(self.store.list_pending_manual_responses(project_id).await?)
    }

    /// Checks that the acting user may dispatch or confirm responses
    ///
    /// Project admins always may; other members need the explicit send
    /// grant on their membership. Denials are warned and audited.
    async fn require_send_permission(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        record_id: &RecordId,
        operation: &str,
    ) -> Result<(), WorkflowError> {
        let membership =
            auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        if membership.is_admin() || membership.can_send_responses {
            return Ok(());
        }
        tracing::warn!(
            user_id = %acting_user,
            record_id = %record_id,
            operation,
            "Response operation attempted without admin role or send grant"
        );
        self.audit
            .log_permission_denied(
                *acting_user,
                Some(*record_id),
                *project_id,
                operation,
                "requires admin role or the can_send_responses grant",
            )
            .await;
        Err(WorkflowError::Permission(
            "User may not send or confirm responses in this project".to_string(),
        ))
    }

    async fn load_record(
        &self,
        record_id: &RecordId,
        module: SyncModule,
    ) -> Result<ExternalRecord, WorkflowError> {
        self.store
            .get_record(record_id, module)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Record {record_id} not found")))
    }
}

/// Last path segment, used as the platform-side attachment name
fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
