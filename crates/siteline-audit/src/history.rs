//! HistoryRecorder - append-only status history
//!
//! Records every status-bearing field change on a mirrored record, whether
//! caused by sync or by a user. Like the audit logger, persistence
//! failures are warned about and swallowed.

use std::sync::Arc;

use siteline_core::domain::{Actor, HistoryField, RecordId, StatusHistoryEntry};
use siteline_core::ports::IRecordStore;

/// Records status-history entries through the record store.
pub struct HistoryRecorder {
    store: Arc<dyn IRecordStore>,
}

impl HistoryRecorder {
    /// Creates a new `HistoryRecorder` backed by the given record store.
    pub fn new(store: Arc<dyn IRecordStore>) -> Self {
        Self { store }
    }

    /// Records one field transition, swallowing persistence errors.
    pub async fn record_transition(
        &self,
        record_id: RecordId,
        field: HistoryField,
        old_value: Option<String>,
        new_value: impl Into<String>,
        actor: Actor,
    ) {
        let entry = StatusHistoryEntry::new(record_id, field, old_value, new_value, actor);
        if let Err(e) = self.store.append_history(&entry).await {
            tracing::warn!(error = %e, "Failed to save status history entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStore;

    #[tokio::test]
    async fn test_record_transition() {
        let store = Arc::new(MockStore::new());
        let recorder = HistoryRecorder::new(store.clone());
        let record_id = RecordId::new();

        recorder
            .record_transition(
                record_id,
                HistoryField::ExternalStatus,
                Some("open".to_string()),
                "answered",
                Actor::Sync,
            )
            .await;

        let entries = store.history_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record_id(), &record_id);
        assert_eq!(entries[0].field(), HistoryField::ExternalStatus);
        assert_eq!(entries[0].old_value(), Some("open"));
        assert_eq!(entries[0].new_value(), "answered");
        assert_eq!(entries[0].actor(), &Actor::Sync);
    }

    #[tokio::test]
    async fn test_history_failure_is_non_fatal() {
        let store = Arc::new(MockStore::failing());
        let recorder = HistoryRecorder::new(store);

        recorder
            .record_transition(
                RecordId::new(),
                HistoryField::InternalStatus,
                None,
                "assigned_for_review",
                Actor::Sync,
            )
            .await;
    }
}
