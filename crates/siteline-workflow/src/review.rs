//! Review workflow operations
//!
//! Assignment, regular status transitions, and change acknowledgement.
//! Assignment stamps internal review/QC deadlines computed from the
//! external due date: each deadline sits at a configured percentage of the
//! window between now and the end of the due day. Projects may override
//! the percentages; records without a due date get no deadlines.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use siteline_audit::HistoryRecorder;
use siteline_core::config::DeadlineConfig;
use siteline_core::domain::{
    Actor, ExternalRecord, HistoryField, PatchField, ProjectId, ProjectRole, RecordId,
    RecordPatch, ReviewStatus, SyncModule, UserId, WorkflowError,
};
use siteline_core::ports::IRecordStore;

use crate::auth;

/// Assignment, transitions, and acknowledgement over mirrored records
pub struct ReviewWorkflow {
    store: Arc<dyn IRecordStore>,
    history: HistoryRecorder,
    deadlines: DeadlineConfig,
}

impl ReviewWorkflow {
    pub fn new(store: Arc<dyn IRecordStore>, deadlines: DeadlineConfig) -> Self {
        let history = HistoryRecorder::new(store.clone());
        Self {
            store,
            history,
            deadlines,
        }
    }

    /// Assigns a reviewer (and optionally a QC user) to a record
    ///
    /// Forces the record into `AssignedForReview` and stamps both internal
    /// deadlines. Viewers may not assign; reviewers and admins may.
    #[tracing::instrument(skip(self))]
    pub async fn assign_record(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        record_id: &RecordId,
        module: SyncModule,
        reviewer: UserId,
        qc: Option<UserId>,
    ) -> Result<ExternalRecord, WorkflowError> {
        let membership = auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        if membership.role == ProjectRole::Viewer {
            return Err(WorkflowError::Permission(
                "Viewers cannot assign records".to_string(),
            ));
        }

        let mut record = self.load_record(record_id, module).await?;
        let previous = record.review().status;

        let (review_pct, qc_pct) = self.window_percents(project_id).await?;
        let now = Utc::now();
        let review_due = record
            .attributes()
            .due_date
            .and_then(|d| window_deadline(d, now, review_pct));
        let qc_due = record
            .attributes()
            .due_date
            .and_then(|d| window_deadline(d, now, qc_pct));

        record.assign(reviewer, qc, review_due, qc_due)?;
        self.store.save_record(&record).await?;

        self.history
            .record_transition(
                *record.id(),
                HistoryField::InternalStatus,
                Some(previous.name().to_string()),
                ReviewStatus::AssignedForReview.name(),
                Actor::User(*acting_user),
            )
            .await;

        Ok(record)
    }

    /// Applies a regular one-step status transition
    ///
    /// The target status must be reachable in one forward step and allowed
    /// for the acting user's role.
    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        record_id: &RecordId,
        module: SyncModule,
        target: ReviewStatus,
    ) -> Result<ExternalRecord, WorkflowError> {
        let membership = auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        if !target.allowed_for_role(membership.role) {
            return Err(WorkflowError::Permission(format!(
                "Role {} may not set status {target}",
                membership.role
            )));
        }

        let mut record = self.load_record(record_id, module).await?;
        let previous = record.review().status;
        record.transition_status(target)?;
        self.store.save_record(&record).await?;

        self.history
            .record_transition(
                *record.id(),
                HistoryField::InternalStatus,
                Some(previous.name().to_string()),
                target.name(),
                Actor::User(*acting_user),
            )
            .await;

        Ok(record)
    }

    /// Clears the unacknowledged-change flag on a record
    ///
    /// Any project member may acknowledge; the flag only signals "someone
    /// has seen this". Applied as a patch so nothing else on the record
    /// can move.
    #[tracing::instrument(skip(self))]
    pub async fn acknowledge_change(
        &self,
        project_id: &ProjectId,
        acting_user: &UserId,
        record_id: &RecordId,
        module: SyncModule,
    ) -> Result<(), WorkflowError> {
        auth::require_membership(self.store.as_ref(), project_id, acting_user).await?;
        self.load_record(record_id, module).await?;

        let patch = RecordPatch::new().with(PatchField::AcknowledgeChange);
        self.store.apply_patch(record_id, module, &patch).await?;
        Ok(())
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

    /// Resolves the deadline-window percentages, project overrides first
    async fn window_percents(&self, project_id: &ProjectId) -> Result<(u8, u8), WorkflowError> {
        let project = self.store.get_project(project_id).await?;
        let review = project
            .as_ref()
            .and_then(|p| p.review_window_percent)
            .unwrap_or(self.deadlines.review_window_percent);
        let qc = project
            .as_ref()
            .and_then(|p| p.qc_window_percent)
            .unwrap_or(self.deadlines.qc_window_percent);
        Ok((review, qc))
    }
}

/// Places a deadline at `percent` of the window between `now` and the end
/// of the due day (UTC). Past-due records get no deadline.
fn window_deadline(due_date: NaiveDate, now: DateTime<Utc>, percent: u8) -> Option<DateTime<Utc>> {
    let due_end = due_date.and_hms_opt(23, 59, 59)?.and_utc();
    let window = due_end - now;
    if window <= Duration::zero() {
        return None;
    }
    let offset = Duration::seconds(window.num_seconds() * i64::from(percent) / 100);
    Some(now + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_sits_inside_the_window() {
        let now = Utc::now();
        let due = (now + Duration::days(10)).date_naive();

        let half = window_deadline(due, now, 50).unwrap();
        let late = window_deadline(due, now, 80).unwrap();
        assert!(half > now);
        assert!(late > half);

        let due_end = due.and_hms_opt(23, 59, 59).unwrap().and_utc();
        assert!(late < due_end);
    }

    #[test]
    fn past_due_date_yields_no_deadline() {
        let now = Utc::now();
        let due = (now - Duration::days(3)).date_naive();
        assert!(window_deadline(due, now, 50).is_none());
    }

    #[test]
    fn full_window_lands_just_before_due_end() {
        let now = Utc::now();
        let due = (now + Duration::days(1)).date_naive();
        let deadline = window_deadline(due, now, 100).unwrap();
        let due_end = due.and_hms_opt(23, 59, 59).unwrap().and_utc();
        assert!(deadline <= due_end);
        assert!(due_end - deadline < Duration::seconds(2));
    }
}
