//! Domain entities and business rules
//!
//! Pure domain logic: entities, value objects, and the review state
//! machine. Nothing in this module performs I/O.

pub mod audit;
pub mod errors;
pub mod link;
pub mod membership;
pub mod newtypes;
pub mod patch;
pub mod record;
pub mod run_log;

pub use audit::{AuditAction, AuditEntry, HistoryField, StatusHistoryEntry};
pub use errors::{DomainError, WorkflowError};
pub use link::{ExternalProjectLink, LinkRunStatus};
pub use membership::{Project, ProjectMembership, ProjectRole};
pub use newtypes::{
    Actor, ExternalId, Fingerprint, LinkId, ProjectId, RecordId, RunId, UserId,
};
pub use patch::{PatchField, RecordPatch};
pub use record::{
    ChangeSummary, ExternalAttributes, ExternalRecord, FieldDelta, ManualResponsePayload,
    ReviewState, ReviewStatus, SyncMeta, SyncModule,
};
pub use run_log::{RunLog, RunStatus, SyncCursor, SyncTrigger};
