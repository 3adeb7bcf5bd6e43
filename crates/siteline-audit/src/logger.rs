//! AuditLogger - high-level audit logging service
//!
//! Wraps `IRecordStore::append_audit()` with convenience methods for each
//! auditable operation. All methods are non-fatal: errors in audit
//! persistence are logged via `tracing::warn!` but never propagated.

use std::sync::Arc;

use serde_json::json;
use siteline_core::domain::{AuditAction, AuditEntry, ProjectId, RecordId, UserId};
use siteline_core::ports::IRecordStore;

/// High-level audit logger that wraps the record store's audit persistence.
///
/// All methods silently swallow errors (logging a warning) so that audit
/// failures never break response dispatch or confirmation flows.
pub struct AuditLogger {
    store: Arc<dyn IRecordStore>,
}

impl AuditLogger {
    /// Creates a new `AuditLogger` backed by the given record store.
    pub fn new(store: Arc<dyn IRecordStore>) -> Self {
        Self { store }
    }

    /// Persist an audit entry, swallowing errors with a tracing warning.
    async fn save(&self, entry: &AuditEntry) {
        if let Err(e) = self.store.append_audit(entry).await {
            tracing::warn!(error = %e, "Failed to save audit entry");
        }
    }

    /// Log a successfully dispatched official response.
    pub async fn log_response_sent(
        &self,
        actor: UserId,
        record_id: RecordId,
        project_id: ProjectId,
        response_status: &str,
        file_names: &[String],
    ) {
        let entry = AuditEntry::new(actor, AuditAction::ResponseSent)
            .with_record(record_id)
            .with_project(project_id)
            .with_details(json!({
                "responseStatus": response_status,
                "fileCount": file_names.len(),
                "fileNames": file_names,
            }));
        self.save(&entry).await;
    }

    /// Log a response dispatch that failed partway through its side effects.
    pub async fn log_response_send_failed(
        &self,
        actor: UserId,
        record_id: RecordId,
        project_id: ProjectId,
        step: &str,
        error: &str,
    ) {
        let entry = AuditEntry::new(actor, AuditAction::ResponseSendFailed)
            .with_record(record_id)
            .with_project(project_id)
            .with_details(json!({
                "step": step,
                "error": error,
            }));
        self.save(&entry).await;
    }

    /// Log the confirmation of a manually entered platform response.
    pub async fn log_manual_response_confirmed(
        &self,
        actor: UserId,
        record_id: RecordId,
        project_id: ProjectId,
        captured_status: Option<&str>,
    ) {
        let entry = AuditEntry::new(actor, AuditAction::ManualResponseConfirmed)
            .with_record(record_id)
            .with_project(project_id)
            .with_details(json!({
                "capturedStatus": captured_status,
            }));
        self.save(&entry).await;
    }

    /// Log a gated operation attempted without the required permission.
    pub async fn log_permission_denied(
        &self,
        actor: UserId,
        record_id: Option<RecordId>,
        project_id: ProjectId,
        operation: &str,
        reason: &str,
    ) {
        let mut entry = AuditEntry::new(actor, AuditAction::PermissionDenied)
            .with_project(project_id)
            .with_details(json!({
                "operation": operation,
                "reason": reason,
            }));
        if let Some(record_id) = record_id {
            entry = entry.with_record(record_id);
        }
        self.save(&entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStore;

    #[tokio::test]
    async fn test_log_response_sent() {
        let store = Arc::new(MockStore::new());
        let logger = AuditLogger::new(store.clone());
        let actor = UserId::new();
        let record_id = RecordId::new();

        logger
            .log_response_sent(
                actor,
                record_id,
                ProjectId::new(),
                "answered",
                &["detail.pdf".to_string(), "sketch.png".to_string()],
            )
            .await;

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), AuditAction::ResponseSent);
        assert_eq!(entries[0].actor(), &actor);
        assert_eq!(entries[0].record_id(), Some(&record_id));
        assert_eq!(entries[0].details()["fileCount"], 2);
        assert_eq!(entries[0].details()["fileNames"][0], "detail.pdf");
    }

    #[tokio::test]
    async fn test_log_response_send_failed() {
        let store = Arc::new(MockStore::new());
        let logger = AuditLogger::new(store.clone());

        logger
            .log_response_send_failed(
                UserId::new(),
                RecordId::new(),
                ProjectId::new(),
                "upload_attachment",
                "connection reset",
            )
            .await;

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), AuditAction::ResponseSendFailed);
        assert_eq!(entries[0].details()["step"], "upload_attachment");
    }

    #[tokio::test]
    async fn test_log_permission_denied_without_record() {
        let store = Arc::new(MockStore::new());
        let logger = AuditLogger::new(store.clone());

        logger
            .log_permission_denied(
                UserId::new(),
                None,
                ProjectId::new(),
                "send_response",
                "missing can_send_responses grant",
            )
            .await;

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), AuditAction::PermissionDenied);
        assert!(entries[0].record_id().is_none());
    }

    #[tokio::test]
    async fn test_audit_failure_is_non_fatal() {
        let store = Arc::new(MockStore::failing());
        let logger = AuditLogger::new(store);

        // This should NOT panic or return an error
        logger
            .log_manual_response_confirmed(
                UserId::new(),
                RecordId::new(),
                ProjectId::new(),
                Some("answered"),
            )
            .await;
    }
}
