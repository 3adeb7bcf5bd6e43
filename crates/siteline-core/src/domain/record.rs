//! ExternalRecord domain entity
//!
//! An `ExternalRecord` is the local mirror of one work item (RFI or
//! submittal) owned by the external construction platform. Its fields are
//! split into three explicitly-named ownership groups:
//!
//! - [`ExternalAttributes`] — owned by the platform, overwritten verbatim
//!   on every sync.
//! - [`ReviewState`] — owned by the internal workflow; sync never writes
//!   these.
//! - [`SyncMeta`] — written only by the sync engine (plus the explicit
//!   user acknowledgement), read by everything else.
//!
//! ## Internal review state machine
//!
//! ```text
//! Unassigned → AssignedForReview → UnderReview → UnderQc
//!            → ReadyForResponse → SentToAcc → Closed (terminal)
//! ```
//!
//! Regular transitions move one step forward. Two operations bypass the
//! chain: response dispatch forces `SentToAcc`, and manual-response
//! confirmation forces `Closed` from any non-terminal state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;
use super::membership::ProjectRole;
use super::newtypes::{ExternalId, Fingerprint, LinkId, ProjectId, RecordId, UserId};

// ============================================================================
// SyncModule
// ============================================================================

/// The two classes of work items mirrored from the external platform
///
/// Structurally identical on the local side; kept as separate collections
/// because their external identifier spaces are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncModule {
    /// Requests for information
    Rfi,
    /// Submittals
    Submittal,
}

impl SyncModule {
    /// Returns the module name as a lowercase string
    pub fn name(&self) -> &'static str {
        match self {
            SyncModule::Rfi => "rfi",
            SyncModule::Submittal => "submittal",
        }
    }
}

impl fmt::Display for SyncModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SyncModule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rfi" => Ok(SyncModule::Rfi),
            "submittal" => Ok(SyncModule::Submittal),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown sync module: {other}"
            ))),
        }
    }
}

// ============================================================================
// ReviewStatus state machine
// ============================================================================

/// Internal review workflow status of a mirrored record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Not yet picked up by the internal team
    #[default]
    Unassigned,
    /// A reviewer (and optionally a QC user) has been assigned
    AssignedForReview,
    /// Review in progress
    UnderReview,
    /// Quality-control pass in progress
    UnderQc,
    /// Review complete, response drafted and awaiting dispatch
    ReadyForResponse,
    /// The official response was pushed to the external platform
    SentToAcc,
    /// Closed (terminal)
    Closed,
}

impl ReviewStatus {
    /// Returns the status name as a stable string
    pub fn name(&self) -> &'static str {
        match self {
            ReviewStatus::Unassigned => "unassigned",
            ReviewStatus::AssignedForReview => "assigned_for_review",
            ReviewStatus::UnderReview => "under_review",
            ReviewStatus::UnderQc => "under_qc",
            ReviewStatus::ReadyForResponse => "ready_for_response",
            ReviewStatus::SentToAcc => "sent_to_acc",
            ReviewStatus::Closed => "closed",
        }
    }

    /// Returns true if this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Closed)
    }

    /// Returns the next status in the forward chain, if any
    fn next(&self) -> Option<ReviewStatus> {
        match self {
            ReviewStatus::Unassigned => Some(ReviewStatus::AssignedForReview),
            ReviewStatus::AssignedForReview => Some(ReviewStatus::UnderReview),
            ReviewStatus::UnderReview => Some(ReviewStatus::UnderQc),
            ReviewStatus::UnderQc => Some(ReviewStatus::ReadyForResponse),
            ReviewStatus::ReadyForResponse => Some(ReviewStatus::SentToAcc),
            ReviewStatus::SentToAcc => Some(ReviewStatus::Closed),
            ReviewStatus::Closed => None,
        }
    }

    /// Checks whether a regular transition to `target` is valid
    ///
    /// Regular transitions move exactly one step forward along the chain.
    /// The forced moves (assignment, dispatch, manual confirmation) do not
    /// go through this check.
    pub fn can_transition_to(&self, target: ReviewStatus) -> bool {
        self.next() == Some(target)
    }

    /// Checks whether the given role may set this status via a regular
    /// transition
    ///
    /// Reviewers may never move a record to `SentToAcc` or `Closed`;
    /// viewers may never transition at all.
    pub fn allowed_for_role(&self, role: ProjectRole) -> bool {
        match role {
            ProjectRole::Admin => true,
            ProjectRole::Reviewer => {
                !matches!(self, ReviewStatus::SentToAcc | ReviewStatus::Closed)
            }
            ProjectRole::Viewer => false,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unassigned" => Ok(ReviewStatus::Unassigned),
            "assigned_for_review" => Ok(ReviewStatus::AssignedForReview),
            "under_review" => Ok(ReviewStatus::UnderReview),
            "under_qc" => Ok(ReviewStatus::UnderQc),
            "ready_for_response" => Ok(ReviewStatus::ReadyForResponse),
            "sent_to_acc" => Ok(ReviewStatus::SentToAcc),
            "closed" => Ok(ReviewStatus::Closed),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown review status: {other}"
            ))),
        }
    }
}

// ============================================================================
// Field groups
// ============================================================================

/// Externally-owned attributes, overwritten verbatim on every sync
///
/// The source of truth for every field in this struct is the external
/// platform. Sync replaces the whole group; nothing else writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAttributes {
    /// Status string as reported by the platform (e.g. "open", "closed")
    pub status: String,
    /// Item title
    pub title: String,
    /// Item description / question body
    pub description: String,
    /// Priority label, if the platform assigns one
    pub priority: Option<String>,
    /// Due date on the external side
    pub due_date: Option<NaiveDate>,
    /// Discipline / trade classification
    pub discipline: Option<String>,
    /// External-side assignee display names or ids
    pub assignees: Vec<String>,
    /// When the item was created on the platform
    pub external_created_at: Option<DateTime<Utc>>,
    /// When the item was last updated on the platform
    pub external_updated_at: Option<DateTime<Utc>>,
}

/// Internally-owned workflow state; sync must never write these fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    /// Internal review workflow status
    pub status: ReviewStatus,
    /// Response status chosen when dispatching the official response
    pub response_status: Option<String>,
    /// Official response text
    pub response_text: Option<String>,
    /// When the official response was sent to the platform
    pub response_sent_at: Option<DateTime<Utc>>,
    /// Who sent the official response
    pub response_sent_by: Option<UserId>,
    /// Internal review deadline
    pub review_due_at: Option<DateTime<Utc>>,
    /// Internal QC deadline
    pub qc_due_at: Option<DateTime<Utc>>,
    /// Assigned reviewer
    pub assigned_reviewer: Option<UserId>,
    /// Assigned QC user
    pub assigned_qc: Option<UserId>,
}

/// Sync-maintained metadata; written only by the sync engine, except for
/// the explicit user acknowledgement that clears the change flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Set when the fingerprint changed since last seen; cleared only by
    /// an explicit user acknowledgement, never by sync
    pub has_unacknowledged_change: bool,
    /// When the external platform's data last changed
    pub last_acc_change_at: Option<DateTime<Utc>>,
    /// Field-by-field summary of the last detected change
    pub change_summary: Option<ChangeSummary>,
    /// Set when an out-of-band response was detected on the platform
    pub has_manual_response: bool,
    /// Captured manual-response payload (JSON, see [`ManualResponsePayload`])
    pub manual_response_payload: Option<String>,
    /// When the manual response was first detected
    pub manual_response_detected_at: Option<DateTime<Utc>>,
    /// When the manual response was confirmed by an admin
    pub manual_response_confirmed_at: Option<DateTime<Utc>>,
    /// Who confirmed the manual response
    pub manual_response_confirmed_by: Option<UserId>,
    /// When this record was first mirrored
    pub first_seen_at: DateTime<Utc>,
    /// When this record was last touched by sync
    pub last_seen_at: DateTime<Utc>,
}

impl SyncMeta {
    /// Creates fresh sync metadata for a newly mirrored record
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            has_unacknowledged_change: false,
            last_acc_change_at: None,
            change_summary: None,
            has_manual_response: false,
            manual_response_payload: None,
            manual_response_detected_at: None,
            manual_response_confirmed_at: None,
            manual_response_confirmed_by: None,
            first_seen_at: now,
            last_seen_at: now,
        }
    }
}

// ============================================================================
// ChangeSummary
// ============================================================================

/// An old/new pair for one changed field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Field-by-field summary of a detected external change
///
/// Intentionally narrower than the fingerprint projection: the fingerprint
/// answers "did anything reviewable change?", while the summary drives a
/// compact diff of the four fields reviewers act on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FieldDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldDelta>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "dueDate")]
    pub due_date: Option<FieldDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<FieldDelta>,
}

impl ChangeSummary {
    /// Returns true if no field delta was recorded
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.title.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
    }
}

// ============================================================================
// ManualResponsePayload
// ============================================================================

/// Captured snapshot of a response entered directly in the external platform
///
/// This is the one JSON wire shape defined by the core: flat, camelCase,
/// all fields nullable strings (timestamps as RFC 3339). Absent optional
/// fields deserialize to `None`, never to an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualResponsePayload {
    /// Response status on the external side
    pub status: Option<String>,
    /// Response text
    pub text: Option<String>,
    /// Who responded on the external side
    pub responded_by: Option<String>,
    /// When the response was entered (RFC 3339)
    pub responded_at: Option<String>,
    /// When Siteline first detected the response (RFC 3339)
    pub detected_at: Option<String>,
}

impl ManualResponsePayload {
    /// Parses a captured payload from its stored JSON form
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the payload to its stored JSON form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// ExternalRecord
// ============================================================================

/// The local mirror of one external work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// Unique identifier within Siteline
    id: RecordId,
    /// The link this record was mirrored through
    link_id: LinkId,
    /// The internal project aggregating the link
    project_id: ProjectId,
    /// Which module collection this record belongs to
    module: SyncModule,
    /// The platform's identifier; unique per (link, module)
    external_id: ExternalId,
    /// Externally-owned attributes
    attributes: ExternalAttributes,
    /// Content fingerprint over the projected external fields
    fingerprint: Fingerprint,
    /// Internally-owned workflow state
    review: ReviewState,
    /// Sync-maintained metadata
    sync: SyncMeta,
}

impl ExternalRecord {
    /// Creates a freshly mirrored record from external data
    ///
    /// Sync metadata starts clean: no unacknowledged change, no manual
    /// response, first/last seen stamped with `now`.
    pub fn new(
        link_id: LinkId,
        project_id: ProjectId,
        module: SyncModule,
        external_id: ExternalId,
        attributes: ExternalAttributes,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            link_id,
            project_id,
            module,
            external_id,
            attributes,
            fingerprint,
            review: ReviewState::default(),
            sync: SyncMeta::new(now),
        }
    }

    /// Reconstructs a record from its persisted parts
    pub fn from_parts(
        id: RecordId,
        link_id: LinkId,
        project_id: ProjectId,
        module: SyncModule,
        external_id: ExternalId,
        attributes: ExternalAttributes,
        fingerprint: Fingerprint,
        review: ReviewState,
        sync: SyncMeta,
    ) -> Self {
        Self {
            id,
            link_id,
            project_id,
            module,
            external_id,
            attributes,
            fingerprint,
            review,
            sync,
        }
    }

    // --- Getters ---

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn link_id(&self) -> &LinkId {
        &self.link_id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn module(&self) -> SyncModule {
        self.module
    }

    pub fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    pub fn attributes(&self) -> &ExternalAttributes {
        &self.attributes
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn review(&self) -> &ReviewState {
        &self.review
    }

    pub fn sync(&self) -> &SyncMeta {
        &self.sync
    }

    /// Returns true if a manual response is flagged and not yet confirmed
    pub fn has_pending_manual_response(&self) -> bool {
        self.sync.has_manual_response && self.sync.manual_response_confirmed_at.is_none()
    }

    // --- Workflow mutations ---
    //
    // These are the only paths that write the internally-owned group. The
    // sync engine never calls them; it mutates records exclusively through
    // RecordPatch, whose variants cannot express ReviewState fields.

    /// Applies a regular one-step status transition
    pub fn transition_status(&mut self, target: ReviewStatus) -> Result<(), DomainError> {
        if !self.review.status.can_transition_to(target) {
            return Err(DomainError::InvalidTransition {
                from: self.review.status.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.review.status = target;
        Ok(())
    }

    /// Assigns reviewer/QC users, stamps deadlines, and forces the record
    /// into `AssignedForReview`
    ///
    /// Fails on terminal records; otherwise the forced move is legal from
    /// any state, including moving "backwards" from a later review stage.
    pub fn assign(
        &mut self,
        reviewer: UserId,
        qc: Option<UserId>,
        review_due_at: Option<DateTime<Utc>>,
        qc_due_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        if self.review.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.review.status.name().to_string(),
                to: ReviewStatus::AssignedForReview.name().to_string(),
            });
        }
        self.review.assigned_reviewer = Some(reviewer);
        self.review.assigned_qc = qc;
        self.review.review_due_at = review_due_at;
        self.review.qc_due_at = qc_due_at;
        self.review.status = ReviewStatus::AssignedForReview;
        Ok(())
    }

    /// Records a successfully dispatched official response and forces the
    /// record into `SentToAcc`
    pub fn mark_response_sent(
        &mut self,
        status: impl Into<String>,
        text: impl Into<String>,
        by: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.review.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.review.status.name().to_string(),
                to: ReviewStatus::SentToAcc.name().to_string(),
            });
        }
        self.review.response_status = Some(status.into());
        self.review.response_text = Some(text.into());
        self.review.response_sent_at = Some(at);
        self.review.response_sent_by = Some(by);
        self.review.status = ReviewStatus::SentToAcc;
        Ok(())
    }

    /// Applies a manual-response confirmation: stamps the confirmer, copies
    /// the captured status/text into the response fields, and force-closes
    ///
    /// The caller is responsible for the pending/already-confirmed checks;
    /// this method enforces the structural invariants.
    pub fn apply_manual_confirmation(
        &mut self,
        captured: &ManualResponsePayload,
        by: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.has_pending_manual_response() {
            return Err(DomainError::ValidationFailed(
                "No pending manual response to confirm".to_string(),
            ));
        }
        self.sync.manual_response_confirmed_at = Some(at);
        self.sync.manual_response_confirmed_by = Some(by);
        self.review.response_status = captured.status.clone();
        self.review.response_text = captured.text.clone();
        self.review.status = ReviewStatus::Closed;
        Ok(())
    }

    /// Flags a manual response detected at record-creation time
    ///
    /// Used by the merge engine on the create path, where the record has
    /// not been persisted yet and a patch cannot be applied.
    pub fn record_manual_response(&mut self, payload_json: String, detected_at: DateTime<Utc>) {
        self.sync.has_manual_response = true;
        self.sync.manual_response_payload = Some(payload_json);
        // First-detected semantics: never move an existing detection time
        if self.sync.manual_response_detected_at.is_none() {
            self.sync.manual_response_detected_at = Some(detected_at);
        }
    }

    /// Clears the unacknowledged-change flag (explicit user action)
    pub fn acknowledge_change(&mut self) {
        self.sync.has_unacknowledged_change = false;
    }
}
