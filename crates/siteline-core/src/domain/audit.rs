//! Audit and status-history entries
//!
//! Outbound writes to the external platform and permission denials are
//! recorded as [`AuditEntry`] rows. Status-bearing field changes, whether
//! caused by sync or by users, are recorded as [`StatusHistoryEntry`] rows.
//! Both trails are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::newtypes::{Actor, ProjectId, RecordId, UserId};

/// Audited action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An official response was dispatched to the platform
    ResponseSent,
    /// A response dispatch failed partway through its side effects
    ResponseSendFailed,
    /// A manually entered platform response was confirmed by an admin
    ManualResponseConfirmed,
    /// A gated operation was attempted without the required permission
    PermissionDenied,
}

impl AuditAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuditAction::ResponseSent => "response_sent",
            AuditAction::ResponseSendFailed => "response_send_failed",
            AuditAction::ManualResponseConfirmed => "manual_response_confirmed",
            AuditAction::PermissionDenied => "permission_denied",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = super::errors::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "response_sent" => Ok(AuditAction::ResponseSent),
            "response_send_failed" => Ok(AuditAction::ResponseSendFailed),
            "manual_response_confirmed" => Ok(AuditAction::ManualResponseConfirmed),
            "permission_denied" => Ok(AuditAction::PermissionDenied),
            other => Err(super::errors::DomainError::ValidationFailed(format!(
                "Unknown audit action: {other}"
            ))),
        }
    }
}

/// One audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Database row id; None until persisted
    id: Option<i64>,
    /// The user who performed (or attempted) the action
    actor: UserId,
    /// What happened
    action: AuditAction,
    /// The record acted on, if any
    record_id: Option<RecordId>,
    /// The project scope, if any
    project_id: Option<ProjectId>,
    /// Structured action details (response status, file names, reason)
    details: serde_json::Value,
    /// When the action happened
    timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an audit entry stamped with the current time
    pub fn new(actor: UserId, action: AuditAction) -> Self {
        Self {
            id: None,
            actor,
            action,
            record_id: None,
            project_id: None,
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Reconstructs an entry from its persisted parts
    pub fn from_parts(
        id: i64,
        actor: UserId,
        action: AuditAction,
        record_id: Option<RecordId>,
        project_id: Option<ProjectId>,
        details: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            actor,
            action,
            record_id,
            project_id,
            details,
            timestamp,
        }
    }

    /// Builder: scopes the entry to a record
    #[must_use]
    pub fn with_record(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Builder: scopes the entry to a project
    #[must_use]
    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Builder: attaches structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    // --- Getters ---

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn actor(&self) -> &UserId {
        &self.actor
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    pub fn details(&self) -> &serde_json::Value {
        &self.details
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Which status-bearing field a history entry tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryField {
    /// The platform-side status string
    ExternalStatus,
    /// The internal review workflow status
    InternalStatus,
    /// The response status
    ResponseStatus,
}

impl HistoryField {
    pub fn name(&self) -> &'static str {
        match self {
            HistoryField::ExternalStatus => "external_status",
            HistoryField::InternalStatus => "internal_status",
            HistoryField::ResponseStatus => "response_status",
        }
    }
}

impl fmt::Display for HistoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for HistoryField {
    type Err = super::errors::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external_status" => Ok(HistoryField::ExternalStatus),
            "internal_status" => Ok(HistoryField::InternalStatus),
            "response_status" => Ok(HistoryField::ResponseStatus),
            other => Err(super::errors::DomainError::ValidationFailed(format!(
                "Unknown history field: {other}"
            ))),
        }
    }
}

/// One status-history entry for a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// Database row id; None until persisted
    id: Option<i64>,
    /// The record whose field changed
    record_id: RecordId,
    /// Which field changed
    field: HistoryField,
    /// Previous value; None for the first recorded value
    old_value: Option<String>,
    /// New value
    new_value: String,
    /// Who caused the change (sync or a user)
    actor: Actor,
    /// When the change happened
    timestamp: DateTime<Utc>,
}

impl StatusHistoryEntry {
    /// Creates a history entry stamped with the current time
    pub fn new(
        record_id: RecordId,
        field: HistoryField,
        old_value: Option<String>,
        new_value: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            id: None,
            record_id,
            field,
            old_value,
            new_value: new_value.into(),
            actor,
            timestamp: Utc::now(),
        }
    }

    /// Reconstructs an entry from its persisted parts
    pub fn from_parts(
        id: i64,
        record_id: RecordId,
        field: HistoryField,
        old_value: Option<String>,
        new_value: String,
        actor: Actor,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            record_id,
            field,
            old_value,
            new_value,
            actor,
            timestamp,
        }
    }

    // --- Getters ---

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn field(&self) -> HistoryField {
        self.field
    }

    pub fn old_value(&self) -> Option<&str> {
        self.old_value.as_deref()
    }

    pub fn new_value(&self) -> &str {
        &self.new_value
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
