//! SQLite implementation of IRecordStore
//!
//! Concrete SQLite-based implementation of the record store port defined
//! in siteline-core. Handles all domain type serialization and SQL query
//! construction.
//!
//! ## Type Mapping
//!
//! | Domain Type              | SQL Type | Strategy                                    |
//! |--------------------------|----------|---------------------------------------------|
//! | ProjectId, LinkId, ...   | TEXT     | UUID string via `.to_string()` / `FromStr`  |
//! | ExternalId, Fingerprint  | TEXT     | String via `.as_str()` / validated ctor     |
//! | DateTime<Utc>            | TEXT     | ISO 8601 via `to_rfc3339()`                 |
//! | NaiveDate                | TEXT     | `YYYY-MM-DD`                                |
//! | ReviewStatus, roles, ... | TEXT     | stable name string via `Display`/`FromStr`  |
//! | RunStatus                | TEXT     | plain name; `failed:<message>` for failures |
//! | Vec<String>, ChangeSummary | TEXT   | serde_json serialization                    |
//!
//! RFIs and submittals live in separate tables with identical shapes; the
//! module argument selects the table.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use siteline_core::domain::{
    Actor, AuditAction, AuditEntry, ChangeSummary, ExternalAttributes, ExternalId,
    ExternalProjectLink, ExternalRecord, Fingerprint, HistoryField, LinkId, LinkRunStatus,
    PatchField, Project, ProjectId, ProjectMembership, ProjectRole, RecordId, RecordPatch,
    ReviewState, ReviewStatus, RunId, RunLog, RunStatus, StatusHistoryEntry, SyncCursor,
    SyncMeta, SyncModule, SyncTrigger, UserId,
};
use siteline_core::ports::IRecordStore;

use crate::StoreError;

/// SQLite-based implementation of the record store port
///
/// All operations go through a connection pool for concurrency.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

/// Embedded schema, applied on every open (idempotent CREATE IF NOT EXISTS)
const SCHEMA: &str = include_str!("migrations/0001_initial.sql");

impl SqliteRecordStore {
    /// Creates a store instance over an already configured pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a file-backed store at `db_path`, creating file, parent
    /// directories, and schema as needed
    ///
    /// WAL journal mode keeps readers unblocked during sync writes; the
    /// busy timeout absorbs short write contention between the sync
    /// engine and workflow operations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let store = Self::connect(options, 5).await?;
        tracing::info!(path = %db_path.display(), "Record store opened");
        Ok(store)
    }

    /// Opens a fresh in-memory store
    ///
    /// Capped at one connection: an in-memory SQLite database lives and
    /// dies with its connection, so a second one would see empty tables.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self { pool })
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// The mirror table holding one module's records
fn table_for(module: SyncModule) -> &'static str {
    match module {
        SyncModule::Rfi => "rfi_records",
        SyncModule::Submittal => "submittal_records",
    }
}

/// Serialize a RunStatus to a string for storage
///
/// Plain statuses are stored by name; the Failed variant is stored as
/// `failed:<message>`.
fn run_status_to_string(status: &RunStatus) -> String {
    match status {
        RunStatus::Started => "started".to_string(),
        RunStatus::Completed => "completed".to_string(),
        RunStatus::Failed(msg) => format!("failed:{}", msg),
    }
}

/// Deserialize a RunStatus from its stored string representation
fn run_status_from_string(s: &str) -> Result<RunStatus, StoreError> {
    match s {
        "started" => Ok(RunStatus::Started),
        "completed" => Ok(RunStatus::Completed),
        s if s.starts_with("failed:") => Ok(RunStatus::Failed(s[7..].to_string())),
        other => Err(StoreError::SerializationError(format!(
            "Unknown run status: {}",
            other
        ))),
    }
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

/// Parse an optional NaiveDate from an optional `YYYY-MM-DD` string
fn parse_optional_date(s: Option<String>) -> Result<Option<NaiveDate>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => NaiveDate::from_str(val).map(Some).map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse date '{}': {}", val, e))
        }),
        _ => Ok(None),
    }
}

/// Parse a domain value through FromStr, mapping the error
fn parse_domain<T>(s: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(s).map_err(|e| StoreError::SerializationError(format!("'{}': {}", s, e)))
}

/// Parse an optional domain value through FromStr
fn parse_optional_domain<T>(s: Option<String>) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match s {
        Some(ref val) if !val.is_empty() => parse_domain(val).map(Some),
        _ => Ok(None),
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct an ExternalRecord from a database row
fn record_from_row(row: &SqliteRow, module: SyncModule) -> Result<ExternalRecord, StoreError> {
    let id: RecordId = parse_domain(&row.get::<String, _>("id"))?;
    let link_id: LinkId = parse_domain(&row.get::<String, _>("link_id"))?;
    let project_id: ProjectId = parse_domain(&row.get::<String, _>("project_id"))?;
    let external_id = ExternalId::new(row.get::<String, _>("external_id"))
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let fingerprint = Fingerprint::new(row.get::<String, _>("fingerprint"))
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;

    let assignees: Vec<String> = serde_json::from_str(&row.get::<String, _>("assignees"))
        .map_err(|e| StoreError::SerializationError(format!("assignees: {}", e)))?;
    let attributes = ExternalAttributes {
        status: row.get("status"),
        title: row.get("title"),
        description: row.get("description"),
        priority: row.get("priority"),
        due_date: parse_optional_date(row.get("due_date"))?,
        discipline: row.get("discipline"),
        assignees,
        external_created_at: parse_optional_datetime(row.get("external_created_at"))?,
        external_updated_at: parse_optional_datetime(row.get("external_updated_at"))?,
    };

    let review = ReviewState {
        status: parse_domain::<ReviewStatus>(&row.get::<String, _>("review_status"))?,
        response_status: row.get("response_status"),
        response_text: row.get("response_text"),
        response_sent_at: parse_optional_datetime(row.get("response_sent_at"))?,
        response_sent_by: parse_optional_domain(row.get("response_sent_by"))?,
        review_due_at: parse_optional_datetime(row.get("review_due_at"))?,
        qc_due_at: parse_optional_datetime(row.get("qc_due_at"))?,
        assigned_reviewer: parse_optional_domain(row.get("assigned_reviewer"))?,
        assigned_qc: parse_optional_domain(row.get("assigned_qc"))?,
    };

    let change_summary: Option<ChangeSummary> = match row.get::<Option<String>, _>("change_summary")
    {
        Some(ref json) if !json.is_empty() => Some(serde_json::from_str(json).map_err(|e| {
            StoreError::SerializationError(format!("change_summary: {}", e))
        })?),
        _ => None,
    };
    let sync = SyncMeta {
        has_unacknowledged_change: row.get::<i64, _>("has_unacknowledged_change") != 0,
        last_acc_change_at: parse_optional_datetime(row.get("last_acc_change_at"))?,
        change_summary,
        has_manual_response: row.get::<i64, _>("has_manual_response") != 0,
        manual_response_payload: row.get("manual_response_payload"),
        manual_response_detected_at: parse_optional_datetime(
            row.get("manual_response_detected_at"),
        )?,
        manual_response_confirmed_at: parse_optional_datetime(
            row.get("manual_response_confirmed_at"),
        )?,
        manual_response_confirmed_by: parse_optional_domain(
            row.get("manual_response_confirmed_by"),
        )?,
        first_seen_at: parse_datetime(&row.get::<String, _>("first_seen_at"))?,
        last_seen_at: parse_datetime(&row.get::<String, _>("last_seen_at"))?,
    };

    Ok(ExternalRecord::from_parts(
        id,
        link_id,
        project_id,
        module,
        external_id,
        attributes,
        fingerprint,
        review,
        sync,
    ))
}

/// Reconstruct an ExternalProjectLink from a database row
fn link_from_row(row: &SqliteRow) -> Result<ExternalProjectLink, StoreError> {
    Ok(ExternalProjectLink::from_parts(
        parse_domain(&row.get::<String, _>("id"))?,
        parse_domain(&row.get::<String, _>("project_id"))?,
        row.get("display_name"),
        ExternalId::new(row.get::<String, _>("external_project_id"))
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        row.get("storage_folder_id"),
        row.get::<i64, _>("sync_rfis") != 0,
        row.get::<i64, _>("sync_submittals") != 0,
        row.get::<i64, _>("enabled") != 0,
        parse_optional_domain::<LinkRunStatus>(row.get("last_run_status"))?,
        row.get("last_run_error"),
        parse_optional_datetime(row.get("last_run_at"))?,
        parse_datetime(&row.get::<String, _>("created_at"))?,
    ))
}

/// Reconstruct a RunLog from a database row
fn run_log_from_row(row: &SqliteRow) -> Result<RunLog, StoreError> {
    let errors: Vec<String> = serde_json::from_str(&row.get::<String, _>("errors"))
        .map_err(|e| StoreError::SerializationError(format!("errors: {}", e)))?;
    Ok(RunLog::from_parts(
        parse_domain::<RunId>(&row.get::<String, _>("id"))?,
        parse_domain(&row.get::<String, _>("project_id"))?,
        parse_domain(&row.get::<String, _>("link_id"))?,
        parse_domain::<SyncModule>(&row.get::<String, _>("module"))?,
        parse_domain::<SyncTrigger>(&row.get::<String, _>("triggered_by"))?,
        run_status_from_string(&row.get::<String, _>("status"))?,
        row.get::<i64, _>("items_processed") as u32,
        row.get::<i64, _>("items_created") as u32,
        row.get::<i64, _>("items_updated") as u32,
        errors,
        parse_datetime(&row.get::<String, _>("started_at"))?,
        parse_optional_datetime(row.get("completed_at"))?,
        row.get::<Option<i64>, _>("duration_ms").map(|ms| ms as u64),
    ))
}

/// Reconstruct an AuditEntry from a database row
fn audit_from_row(row: &SqliteRow) -> Result<AuditEntry, StoreError> {
    let details: serde_json::Value = serde_json::from_str(&row.get::<String, _>("details"))
        .map_err(|e| StoreError::SerializationError(format!("details: {}", e)))?;
    Ok(AuditEntry::from_parts(
        row.get::<i64, _>("id"),
        parse_domain::<UserId>(&row.get::<String, _>("actor"))?,
        parse_domain::<AuditAction>(&row.get::<String, _>("action"))?,
        parse_optional_domain(row.get("record_id"))?,
        parse_optional_domain(row.get("project_id"))?,
        details,
        parse_datetime(&row.get::<String, _>("timestamp"))?,
    ))
}

/// Reconstruct a StatusHistoryEntry from a database row
fn history_from_row(row: &SqliteRow) -> Result<StatusHistoryEntry, StoreError> {
    Ok(StatusHistoryEntry::from_parts(
        row.get::<i64, _>("id"),
        parse_domain::<RecordId>(&row.get::<String, _>("record_id"))?,
        parse_domain::<HistoryField>(&row.get::<String, _>("field"))?,
        row.get("old_value"),
        row.get("new_value"),
        parse_domain::<Actor>(&row.get::<String, _>("actor"))?,
        parse_datetime(&row.get::<String, _>("timestamp"))?,
    ))
}

/// Reconstruct a Project from a database row
fn project_from_row(row: &SqliteRow) -> Result<Project, StoreError> {
    Ok(Project {
        id: parse_domain(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        sync_enabled: row.get::<i64, _>("sync_enabled") != 0,
        review_window_percent: row
            .get::<Option<i64>, _>("review_window_percent")
            .map(|v| v as u8),
        qc_window_percent: row
            .get::<Option<i64>, _>("qc_window_percent")
            .map(|v| v as u8),
    })
}

// ============================================================================
// IRecordStore implementation
// ============================================================================

impl SqliteRecordStore {
    /// Inserts or replaces one mirror record row
    async fn upsert_record(
        &self,
        record: &ExternalRecord,
        replace: bool,
    ) -> Result<(), StoreError> {
        let verb = if replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT"
        };
        let sql = format!(
            "{verb} INTO {table} (
                id, link_id, project_id, external_id,
                status, title, description, priority, due_date, discipline,
                assignees, external_created_at, external_updated_at, fingerprint,
                review_status, response_status, response_text, response_sent_at,
                response_sent_by, review_due_at, qc_due_at, assigned_reviewer, assigned_qc,
                has_unacknowledged_change, last_acc_change_at, change_summary,
                has_manual_response, manual_response_payload, manual_response_detected_at,
                manual_response_confirmed_at, manual_response_confirmed_by,
                first_seen_at, last_seen_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            table = table_for(record.module()),
        );

        let attrs = record.attributes();
        let review = record.review();
        let sync = record.sync();
        let assignees = serde_json::to_string(&attrs.assignees)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let change_summary = sync
            .change_summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        sqlx::query(&sql)
            .bind(record.id().to_string())
            .bind(record.link_id().to_string())
            .bind(record.project_id().to_string())
            .bind(record.external_id().as_str())
            .bind(&attrs.status)
            .bind(&attrs.title)
            .bind(&attrs.description)
            .bind(&attrs.priority)
            .bind(attrs.due_date.map(|d| d.to_string()))
            .bind(&attrs.discipline)
            .bind(assignees)
            .bind(attrs.external_created_at.map(|t| t.to_rfc3339()))
            .bind(attrs.external_updated_at.map(|t| t.to_rfc3339()))
            .bind(record.fingerprint().as_str())
            .bind(review.status.name())
            .bind(&review.response_status)
            .bind(&review.response_text)
            .bind(review.response_sent_at.map(|t| t.to_rfc3339()))
            .bind(review.response_sent_by.map(|u| u.to_string()))
            .bind(review.review_due_at.map(|t| t.to_rfc3339()))
            .bind(review.qc_due_at.map(|t| t.to_rfc3339()))
            .bind(review.assigned_reviewer.map(|u| u.to_string()))
            .bind(review.assigned_qc.map(|u| u.to_string()))
            .bind(sync.has_unacknowledged_change as i64)
            .bind(sync.last_acc_change_at.map(|t| t.to_rfc3339()))
            .bind(change_summary)
            .bind(sync.has_manual_response as i64)
            .bind(&sync.manual_response_payload)
            .bind(sync.manual_response_detected_at.map(|t| t.to_rfc3339()))
            .bind(sync.manual_response_confirmed_at.map(|t| t.to_rfc3339()))
            .bind(sync.manual_response_confirmed_by.map(|u| u.to_string()))
            .bind(sync.first_seen_at.to_rfc3339())
            .bind(sync.last_seen_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IRecordStore for SqliteRecordStore {
    // --- Links ---

    async fn save_link(&self, link: &ExternalProjectLink) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO links (
                id, project_id, display_name, external_project_id, storage_folder_id,
                sync_rfis, sync_submittals, enabled,
                last_run_status, last_run_error, last_run_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(link.id().to_string())
        .bind(link.project_id().to_string())
        .bind(link.display_name())
        .bind(link.external_project_id().as_str())
        .bind(link.storage_folder_id())
        .bind(link.sync_rfis() as i64)
        .bind(link.sync_submittals() as i64)
        .bind(link.enabled() as i64)
        .bind(link.last_run_status().map(|s| s.to_string()))
        .bind(link.last_run_error())
        .bind(link.last_run_at().map(|t| t.to_rfc3339()))
        .bind(link.created_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_link(&self, id: &LinkId) -> anyhow::Result<Option<ExternalProjectLink>> {
        let row = sqlx::query("SELECT * FROM links WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.as_ref().map(link_from_row).transpose()?)
    }

    async fn list_links_for_project(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ExternalProjectLink>> {
        let rows = sqlx::query("SELECT * FROM links WHERE project_id = ? ORDER BY created_at")
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(rows
            .iter()
            .map(link_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn delete_link(&self, id: &LinkId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn count_records_for_link(&self, id: &LinkId) -> anyhow::Result<u64> {
        let mut total: i64 = 0;
        for module in [SyncModule::Rfi, SyncModule::Submittal] {
            let sql = format!(
                "SELECT COUNT(*) AS n FROM {} WHERE link_id = ?",
                table_for(module)
            );
            let row = sqlx::query(&sql)
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::from)?;
            total += row.get::<i64, _>("n");
        }
        Ok(total as u64)
    }

    // --- Records ---

    async fn insert_record(&self, record: &ExternalRecord) -> anyhow::Result<()> {
        Ok(self.upsert_record(record, false).await?)
    }

    async fn save_record(&self, record: &ExternalRecord) -> anyhow::Result<()> {
        Ok(self.upsert_record(record, true).await?)
    }

    async fn get_record(
        &self,
        id: &RecordId,
        module: SyncModule,
    ) -> anyhow::Result<Option<ExternalRecord>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", table_for(module));
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.as_ref().map(|r| record_from_row(r, module)).transpose()?)
    }

    async fn find_record(
        &self,
        link_id: &LinkId,
        module: SyncModule,
        external_id: &str,
    ) -> anyhow::Result<Option<ExternalRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE link_id = ? AND external_id = ?",
            table_for(module)
        );
        let row = sqlx::query(&sql)
            .bind(link_id.to_string())
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.as_ref().map(|r| record_from_row(r, module)).transpose()?)
    }

    async fn apply_patch(
        &self,
        id: &RecordId,
        module: SyncModule,
        patch: &RecordPatch,
    ) -> anyhow::Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let table = table_for(module);
        let id = id.to_string();
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        for field in patch {
            match field {
                PatchField::Attributes(attrs) => {
                    let assignees = serde_json::to_string(&attrs.assignees)
                        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                    let sql = format!(
                        "UPDATE {table} SET
                            status = ?, title = ?, description = ?, priority = ?,
                            due_date = ?, discipline = ?, assignees = ?,
                            external_created_at = ?, external_updated_at = ?
                        WHERE id = ?"
                    );
                    sqlx::query(&sql)
                        .bind(&attrs.status)
                        .bind(&attrs.title)
                        .bind(&attrs.description)
                        .bind(&attrs.priority)
                        .bind(attrs.due_date.map(|d| d.to_string()))
                        .bind(&attrs.discipline)
                        .bind(assignees)
                        .bind(attrs.external_created_at.map(|t| t.to_rfc3339()))
                        .bind(attrs.external_updated_at.map(|t| t.to_rfc3339()))
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
                PatchField::Fingerprint(fingerprint) => {
                    let sql = format!("UPDATE {table} SET fingerprint = ? WHERE id = ?");
                    sqlx::query(&sql)
                        .bind(fingerprint.as_str())
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
                PatchField::LastSeenAt(at) => {
                    let sql = format!("UPDATE {table} SET last_seen_at = ? WHERE id = ?");
                    sqlx::query(&sql)
                        .bind(at.to_rfc3339())
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
                PatchField::UnacknowledgedChange { summary, at } => {
                    let summary_json = serde_json::to_string(summary)
                        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                    let sql = format!(
                        "UPDATE {table} SET
                            has_unacknowledged_change = 1,
                            change_summary = ?,
                            last_acc_change_at = ?
                        WHERE id = ?"
                    );
                    sqlx::query(&sql)
                        .bind(summary_json)
                        .bind(at.to_rfc3339())
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
                PatchField::AcknowledgeChange => {
                    let sql =
                        format!("UPDATE {table} SET has_unacknowledged_change = 0 WHERE id = ?");
                    sqlx::query(&sql)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
                PatchField::ManualResponseDetected {
                    payload,
                    detected_at,
                } => {
                    // COALESCE keeps the first detection time on re-detects
                    let sql = format!(
                        "UPDATE {table} SET
                            has_manual_response = 1,
                            manual_response_payload = ?,
                            manual_response_detected_at =
                                COALESCE(manual_response_detected_at, ?)
                        WHERE id = ?"
                    );
                    sqlx::query(&sql)
                        .bind(payload)
                        .bind(detected_at.to_rfc3339())
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
                PatchField::ManualResponsePayloadRefreshed { payload } => {
                    let sql =
                        format!("UPDATE {table} SET manual_response_payload = ? WHERE id = ?");
                    sqlx::query(&sql)
                        .bind(payload)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                }
            }
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn list_pending_manual_responses(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ExternalRecord>> {
        let mut records = Vec::new();
        for module in [SyncModule::Rfi, SyncModule::Submittal] {
            let sql = format!(
                "SELECT * FROM {} WHERE project_id = ?
                    AND has_manual_response = 1
                    AND manual_response_confirmed_at IS NULL",
                table_for(module)
            );
            let rows = sqlx::query(&sql)
                .bind(project_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from)?;
            for row in &rows {
                records.push(record_from_row(row, module)?);
            }
        }
        // Newest detection first, across both modules
        records.sort_by(|a, b| {
            b.sync()
                .manual_response_detected_at
                .cmp(&a.sync().manual_response_detected_at)
        });
        Ok(records)
    }

    // --- Run logs and cursors ---

    async fn save_run_log(&self, log: &RunLog) -> anyhow::Result<()> {
        let errors = serde_json::to_string(log.errors())
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        sqlx::query(
            "INSERT OR REPLACE INTO run_logs (
                id, project_id, link_id, module, triggered_by, status,
                items_processed, items_created, items_updated, errors,
                started_at, completed_at, duration_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.id().to_string())
        .bind(log.project_id().to_string())
        .bind(log.link_id().to_string())
        .bind(log.module().name())
        .bind(log.trigger().to_string())
        .bind(run_status_to_string(log.status()))
        .bind(log.items_processed() as i64)
        .bind(log.items_created() as i64)
        .bind(log.items_updated() as i64)
        .bind(errors)
        .bind(log.started_at().to_rfc3339())
        .bind(log.completed_at().map(|t| t.to_rfc3339()))
        .bind(log.duration_ms().map(|ms| ms as i64))
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_run_log(&self, id: &RunId) -> anyhow::Result<Option<RunLog>> {
        let row = sqlx::query("SELECT * FROM run_logs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.as_ref().map(run_log_from_row).transpose()?)
    }

    async fn get_cursor(
        &self,
        project_id: &ProjectId,
        module: SyncModule,
    ) -> anyhow::Result<Option<SyncCursor>> {
        let row = sqlx::query("SELECT * FROM sync_cursors WHERE project_id = ? AND module = ?")
            .bind(project_id.to_string())
            .bind(module.name())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.map(|row| -> Result<SyncCursor, StoreError> {
            Ok(SyncCursor {
                project_id: parse_domain(&row.get::<String, _>("project_id"))?,
                module: parse_domain(&row.get::<String, _>("module"))?,
                cursor: row.get("cursor"),
                updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
            })
        })
        .transpose()
        .map_err(Into::into)
    }

    async fn save_cursor(&self, cursor: &SyncCursor) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_cursors (project_id, module, cursor, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(cursor.project_id.to_string())
        .bind(cursor.module.name())
        .bind(&cursor.cursor)
        .bind(cursor.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    // --- Audit and history ---

    async fn append_audit(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        let details = serde_json::to_string(entry.details())
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        sqlx::query(
            "INSERT INTO audit_log (actor, action, record_id, project_id, details, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.actor().to_string())
        .bind(entry.action().name())
        .bind(entry.record_id().map(|r| r.to_string()))
        .bind(entry.project_id().map(|p| p.to_string()))
        .bind(details)
        .bind(entry.timestamp().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_audit_trail(&self, record_id: &RecordId) -> anyhow::Result<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log WHERE record_id = ? ORDER BY id")
            .bind(record_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(rows
            .iter()
            .map(audit_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn append_history(&self, entry: &StatusHistoryEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO status_history (record_id, field, old_value, new_value, actor, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.record_id().to_string())
        .bind(entry.field().name())
        .bind(entry.old_value())
        .bind(entry.new_value())
        .bind(entry.actor().to_string())
        .bind(entry.timestamp().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_history(
        &self,
        record_id: &RecordId,
    ) -> anyhow::Result<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query("SELECT * FROM status_history WHERE record_id = ? ORDER BY id")
            .bind(record_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(rows
            .iter()
            .map(history_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    // --- Projects and memberships ---

    async fn save_project(&self, project: &Project) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO projects
                (id, name, sync_enabled, review_window_percent, qc_window_percent)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(project.sync_enabled as i64)
        .bind(project.review_window_percent.map(|v| v as i64))
        .bind(project.qc_window_percent.map(|v| v as i64))
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_project(&self, id: &ProjectId) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.as_ref().map(project_from_row).transpose()?)
    }

    async fn list_sync_enabled_projects(&self) -> anyhow::Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects WHERE sync_enabled = 1 ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(rows
            .iter()
            .map(project_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn save_membership(&self, membership: &ProjectMembership) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO memberships
                (project_id, user_id, role, can_send_responses)
             VALUES (?, ?, ?, ?)",
        )
        .bind(membership.project_id.to_string())
        .bind(membership.user_id.to_string())
        .bind(membership.role.name())
        .bind(membership.can_send_responses as i64)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn get_membership(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> anyhow::Result<Option<ProjectMembership>> {
        let row = sqlx::query("SELECT * FROM memberships WHERE project_id = ? AND user_id = ?")
            .bind(project_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.map(|row| -> Result<ProjectMembership, StoreError> {
            Ok(ProjectMembership {
                project_id: parse_domain(&row.get::<String, _>("project_id"))?,
                user_id: parse_domain(&row.get::<String, _>("user_id"))?,
                role: parse_domain::<ProjectRole>(&row.get::<String, _>("role"))?,
                can_send_responses: row.get::<i64, _>("can_send_responses") != 0,
            })
        })
        .transpose()
        .map_err(Into::into)
    }
}
