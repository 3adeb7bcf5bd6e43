//! Integration tests for the SQLite record store
//!
//! Each test gets a fresh in-memory database; one test exercises the
//! file-backed pool path with a temporary directory.

use chrono::{Duration, NaiveDate, Utc};

use siteline_core::domain::{
    Actor, AuditAction, AuditEntry, ExternalAttributes, ExternalId, ExternalProjectLink,
    ExternalRecord, HistoryField, LinkRunStatus, PatchField, Project, ProjectId,
    ProjectMembership, ProjectRole, RecordPatch, ReviewStatus, RunLog, RunStatus,
    StatusHistoryEntry, SyncCursor, SyncModule, SyncTrigger, UserId,
};
use siteline_core::domain::Fingerprint;
use siteline_core::ports::IRecordStore;
use siteline_store::SqliteRecordStore;

async fn store() -> SqliteRecordStore {
    SqliteRecordStore::open_in_memory()
        .await
        .expect("in-memory store")
}

fn fp(seed: u8) -> Fingerprint {
    Fingerprint::new(format!("{seed:02x}").repeat(32)).unwrap()
}

fn sample_link(project_id: ProjectId) -> ExternalProjectLink {
    ExternalProjectLink::new(
        project_id,
        "Main campus",
        ExternalId::new("acc-proj-1").unwrap(),
    )
    .with_storage_folder("folder-42")
}

fn sample_attributes() -> ExternalAttributes {
    ExternalAttributes {
        status: "open".to_string(),
        title: "Clarify beam size".to_string(),
        description: "See sheet S-301".to_string(),
        priority: Some("high".to_string()),
        due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        discipline: Some("structural".to_string()),
        assignees: vec!["j.doe".to_string(), "a.smith".to_string()],
        external_created_at: None,
        external_updated_at: None,
    }
}

fn sample_record(link: &ExternalProjectLink, external_id: &str) -> ExternalRecord {
    ExternalRecord::new(
        *link.id(),
        *link.project_id(),
        SyncModule::Rfi,
        ExternalId::new(external_id).unwrap(),
        sample_attributes(),
        fp(0xaa),
        Utc::now(),
    )
}

// ============================================================================
// Links
// ============================================================================

#[tokio::test]
async fn link_roundtrip() {
    let store = store().await;
    let project_id = ProjectId::new();
    let mut link = sample_link(project_id);
    link.record_run_outcome(LinkRunStatus::Failed, Some("timeout".to_string()), Utc::now());

    store.save_link(&link).await.unwrap();
    let loaded = store.get_link(link.id()).await.unwrap().unwrap();

    assert_eq!(loaded, link);
    assert_eq!(loaded.storage_folder_id(), Some("folder-42"));
    assert_eq!(loaded.last_run_status(), Some(LinkRunStatus::Failed));
    assert_eq!(loaded.last_run_error(), Some("timeout"));
}

#[tokio::test]
async fn list_links_scoped_to_project() {
    let store = store().await;
    let project_a = ProjectId::new();
    let project_b = ProjectId::new();
    store.save_link(&sample_link(project_a)).await.unwrap();
    store.save_link(&sample_link(project_a)).await.unwrap();
    store.save_link(&sample_link(project_b)).await.unwrap();

    let links = store.list_links_for_project(&project_a).await.unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l.project_id() == &project_a));
}

#[tokio::test]
async fn delete_link_keeps_records() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    store.save_link(&link).await.unwrap();
    let record = sample_record(&link, "RFI-1");
    store.insert_record(&record).await.unwrap();

    store.delete_link(link.id()).await.unwrap();

    assert!(store.get_link(link.id()).await.unwrap().is_none());
    // Mirrored records survive link deletion
    assert!(store
        .get_record(record.id(), SyncModule::Rfi)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn count_records_spans_both_modules() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    store.save_link(&link).await.unwrap();

    store
        .insert_record(&sample_record(&link, "RFI-1"))
        .await
        .unwrap();
    let submittal = ExternalRecord::new(
        *link.id(),
        *link.project_id(),
        SyncModule::Submittal,
        ExternalId::new("SUB-1").unwrap(),
        sample_attributes(),
        fp(0xbb),
        Utc::now(),
    );
    store.insert_record(&submittal).await.unwrap();

    assert_eq!(store.count_records_for_link(link.id()).await.unwrap(), 2);
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn record_roundtrip_preserves_all_field_groups() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    let mut record = sample_record(&link, "RFI-1");
    record
        .assign(UserId::new(), Some(UserId::new()), Some(Utc::now()), None)
        .unwrap();
    record.record_manual_response("{\"text\":\"ok\"}".to_string(), Utc::now());

    store.insert_record(&record).await.unwrap();
    let loaded = store
        .get_record(record.id(), SyncModule::Rfi)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.external_id(), record.external_id());
    assert_eq!(loaded.attributes(), record.attributes());
    assert_eq!(loaded.fingerprint(), record.fingerprint());
    assert_eq!(loaded.review().status, ReviewStatus::AssignedForReview);
    assert_eq!(
        loaded.review().assigned_reviewer,
        record.review().assigned_reviewer
    );
    assert!(loaded.has_pending_manual_response());
}

#[tokio::test]
async fn find_record_by_external_identity() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    let record = sample_record(&link, "RFI-7");
    store.insert_record(&record).await.unwrap();

    let found = store
        .find_record(link.id(), SyncModule::Rfi, "RFI-7")
        .await
        .unwrap();
    assert_eq!(found.unwrap().id(), record.id());

    // Same external id in the other module is a different identity
    let missing = store
        .find_record(link.id(), SyncModule::Submittal, "RFI-7")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn duplicate_external_id_per_link_is_rejected() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    store
        .insert_record(&sample_record(&link, "RFI-1"))
        .await
        .unwrap();

    let duplicate = sample_record(&link, "RFI-1");
    assert!(store.insert_record(&duplicate).await.is_err());
}

#[tokio::test]
async fn apply_patch_updates_sync_fields_only() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    let mut record = sample_record(&link, "RFI-1");
    record
        .assign(UserId::new(), None, Some(Utc::now()), None)
        .unwrap();
    store.insert_record(&record).await.unwrap();

    let mut new_attrs = sample_attributes();
    new_attrs.status = "answered".to_string();
    let new_fp = fp(0xcc);
    let summary = Default::default();
    let now = Utc::now();

    let patch = RecordPatch::new()
        .with(PatchField::LastSeenAt(now))
        .with(PatchField::Attributes(new_attrs.clone()))
        .with(PatchField::Fingerprint(new_fp.clone()))
        .with(PatchField::UnacknowledgedChange { summary, at: now });
    store
        .apply_patch(record.id(), SyncModule::Rfi, &patch)
        .await
        .unwrap();

    let loaded = store
        .get_record(record.id(), SyncModule::Rfi)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.attributes(), &new_attrs);
    assert_eq!(loaded.fingerprint(), &new_fp);
    assert!(loaded.sync().has_unacknowledged_change);
    assert!(loaded.sync().change_summary.is_some());
    // Internal review state is untouched by sync patches
    assert_eq!(loaded.review().status, ReviewStatus::AssignedForReview);
    assert_eq!(
        loaded.review().assigned_reviewer,
        record.review().assigned_reviewer
    );
}

#[tokio::test]
async fn acknowledge_patch_clears_flag() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    let record = sample_record(&link, "RFI-1");
    store.insert_record(&record).await.unwrap();

    let now = Utc::now();
    let raise = RecordPatch::new().with(PatchField::UnacknowledgedChange {
        summary: Default::default(),
        at: now,
    });
    store
        .apply_patch(record.id(), SyncModule::Rfi, &raise)
        .await
        .unwrap();

    let clear = RecordPatch::new().with(PatchField::AcknowledgeChange);
    store
        .apply_patch(record.id(), SyncModule::Rfi, &clear)
        .await
        .unwrap();

    let loaded = store
        .get_record(record.id(), SyncModule::Rfi)
        .await
        .unwrap()
        .unwrap();
    assert!(!loaded.sync().has_unacknowledged_change);
    // The change timestamp survives acknowledgement
    assert!(loaded.sync().last_acc_change_at.is_some());
}

#[tokio::test]
async fn manual_detection_patch_keeps_first_detection_time() {
    let store = store().await;
    let link = sample_link(ProjectId::new());
    let record = sample_record(&link, "RFI-1");
    store.insert_record(&record).await.unwrap();

    let first = Utc::now() - Duration::hours(3);
    let patch = RecordPatch::new().with(PatchField::ManualResponseDetected {
        payload: "{\"text\":\"first\"}".to_string(),
        detected_at: first,
    });
    store
        .apply_patch(record.id(), SyncModule::Rfi, &patch)
        .await
        .unwrap();

    // A second detection must not move the detection time
    let patch = RecordPatch::new().with(PatchField::ManualResponseDetected {
        payload: "{\"text\":\"second\"}".to_string(),
        detected_at: Utc::now(),
    });
    store
        .apply_patch(record.id(), SyncModule::Rfi, &patch)
        .await
        .unwrap();

    let loaded = store
        .get_record(record.id(), SyncModule::Rfi)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.sync().manual_response_detected_at, Some(first));
    assert_eq!(
        loaded.sync().manual_response_payload.as_deref(),
        Some("{\"text\":\"second\"}")
    );
}

#[tokio::test]
async fn pending_manual_responses_exclude_confirmed() {
    let store = store().await;
    let project_id = ProjectId::new();
    let link = sample_link(project_id);

    let mut pending = sample_record(&link, "RFI-1");
    pending.record_manual_response("{}".to_string(), Utc::now());
    store.insert_record(&pending).await.unwrap();

    let mut confirmed = sample_record(&link, "RFI-2");
    confirmed.record_manual_response("{}".to_string(), Utc::now() - Duration::hours(1));
    confirmed
        .apply_manual_confirmation(&Default::default(), UserId::new(), Utc::now())
        .unwrap();
    store.insert_record(&confirmed).await.unwrap();

    let listed = store
        .list_pending_manual_responses(&project_id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), pending.id());
}

#[tokio::test]
async fn pending_manual_responses_newest_first() {
    let store = store().await;
    let project_id = ProjectId::new();
    let link = sample_link(project_id);

    let mut older = sample_record(&link, "RFI-1");
    older.record_manual_response("{}".to_string(), Utc::now() - Duration::hours(5));
    store.insert_record(&older).await.unwrap();

    let mut newer = sample_record(&link, "RFI-2");
    newer.record_manual_response("{}".to_string(), Utc::now());
    store.insert_record(&newer).await.unwrap();

    let listed = store
        .list_pending_manual_responses(&project_id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id(), newer.id());
    assert_eq!(listed[1].id(), older.id());
}

// ============================================================================
// Run logs and cursors
// ============================================================================

#[tokio::test]
async fn run_log_roundtrip() {
    let store = store().await;
    let mut log = RunLog::start(
        ProjectId::new(),
        siteline_core::domain::LinkId::new(),
        SyncModule::Rfi,
        SyncTrigger::Manual,
    );
    log.item_processed();
    log.item_created();
    log.record_error("item RFI-3: bad payload".to_string());
    log.complete();

    store.save_run_log(&log).await.unwrap();
    let loaded = store.get_run_log(log.id()).await.unwrap().unwrap();

    assert_eq!(loaded, log);
    assert_eq!(loaded.status(), &RunStatus::Completed);
    assert_eq!(loaded.errors(), log.errors());
}

#[tokio::test]
async fn failed_run_log_keeps_message() {
    let store = store().await;
    let mut log = RunLog::start(
        ProjectId::new(),
        siteline_core::domain::LinkId::new(),
        SyncModule::Submittal,
        SyncTrigger::Scheduled,
    );
    log.fail("listing failed: 503".to_string());

    store.save_run_log(&log).await.unwrap();
    let loaded = store.get_run_log(log.id()).await.unwrap().unwrap();
    assert!(matches!(loaded.status(), RunStatus::Failed(msg) if msg.contains("503")));
}

#[tokio::test]
async fn cursor_upsert() {
    let store = store().await;
    let project_id = ProjectId::new();

    let first = SyncCursor::at(project_id, SyncModule::Rfi, Utc::now() - Duration::hours(1));
    store.save_cursor(&first).await.unwrap();

    let second = SyncCursor::at(project_id, SyncModule::Rfi, Utc::now());
    store.save_cursor(&second).await.unwrap();

    let loaded = store
        .get_cursor(&project_id, SyncModule::Rfi)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.cursor, second.cursor);

    // Other module has its own cursor
    assert!(store
        .get_cursor(&project_id, SyncModule::Submittal)
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Audit and history
// ============================================================================

#[tokio::test]
async fn audit_trail_is_append_only_and_ordered() {
    let store = store().await;
    let record_id = siteline_core::domain::RecordId::new();
    let actor = UserId::new();

    let first = AuditEntry::new(actor, AuditAction::ResponseSendFailed)
        .with_record(record_id)
        .with_details(serde_json::json!({"step": "post_response"}));
    store.append_audit(&first).await.unwrap();

    let second = AuditEntry::new(actor, AuditAction::ResponseSent)
        .with_record(record_id)
        .with_details(serde_json::json!({"responseStatus": "answered"}));
    store.append_audit(&second).await.unwrap();

    let trail = store.get_audit_trail(&record_id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].action(), AuditAction::ResponseSendFailed);
    assert_eq!(trail[1].action(), AuditAction::ResponseSent);
    assert_eq!(trail[1].details()["responseStatus"], "answered");
    assert!(trail[0].id().is_some());
}

#[tokio::test]
async fn history_roundtrip_with_sync_actor() {
    let store = store().await;
    let record_id = siteline_core::domain::RecordId::new();

    let entry = StatusHistoryEntry::new(
        record_id,
        HistoryField::ExternalStatus,
        Some("open".to_string()),
        "answered",
        Actor::Sync,
    );
    store.append_history(&entry).await.unwrap();

    let user = UserId::new();
    let entry = StatusHistoryEntry::new(
        record_id,
        HistoryField::InternalStatus,
        Some("unassigned".to_string()),
        "assigned_for_review",
        Actor::User(user),
    );
    store.append_history(&entry).await.unwrap();

    let history = store.get_history(&record_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].actor(), &Actor::Sync);
    assert_eq!(history[1].actor(), &Actor::User(user));
    assert_eq!(history[1].new_value(), "assigned_for_review");
}

// ============================================================================
// Projects and memberships
// ============================================================================

#[tokio::test]
async fn project_roundtrip_and_sync_filter() {
    let store = store().await;

    let enabled = Project::new("Campus West").with_deadline_windows(40, 70);
    store.save_project(&enabled).await.unwrap();

    let mut disabled = Project::new("Archive");
    disabled.sync_enabled = false;
    store.save_project(&disabled).await.unwrap();

    let loaded = store.get_project(&enabled.id).await.unwrap().unwrap();
    assert_eq!(loaded, enabled);
    assert_eq!(loaded.review_window_percent, Some(40));

    let listed = store.list_sync_enabled_projects().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, enabled.id);
}

#[tokio::test]
async fn membership_roundtrip() {
    let store = store().await;
    let project_id = ProjectId::new();
    let user_id = UserId::new();

    let membership = ProjectMembership::new(project_id, user_id, ProjectRole::Reviewer)
        .with_send_responses();
    store.save_membership(&membership).await.unwrap();

    let loaded = store
        .get_membership(&project_id, &user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, membership);
    assert!(loaded.can_send_responses);

    assert!(store
        .get_membership(&project_id, &UserId::new())
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// File-backed pool
// ============================================================================

#[tokio::test]
async fn file_backed_pool_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("state").join("siteline.db");

    let project = Project::new("Campus West");
    {
        let store = SqliteRecordStore::open(&db_path).await.expect("open store");
        store.save_project(&project).await.unwrap();
    }

    let store = SqliteRecordStore::open(&db_path).await.expect("reopen store");
    let loaded = store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Campus West");
}
