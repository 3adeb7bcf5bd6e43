//! Domain and workflow error types
//!
//! `DomainError` covers failures inside pure domain operations (invalid
//! identifiers, illegal state transitions). `WorkflowError` is the typed
//! surface returned by user-facing operations: every failure path in the
//! workflow crate maps to exactly one of its variants.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid identifier format or content
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid external identifier (empty or malformed)
    #[error("Invalid external ID: {0}")]
    InvalidExternalId(String),

    /// Invalid content fingerprint (expected lowercase SHA-256 hex)
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Invalid review status transition attempt
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status
        from: String,
        /// The attempted target status
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors surfaced by user-facing workflow operations
///
/// Each variant corresponds to one failure class with a distinct retry
/// contract: validation/permission/not-found/conflict errors are never
/// retried, corrupt-data errors require a re-sync first, and external
/// errors may be retried by the caller once the platform recovers.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input validation failed (missing response status/text/files)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The acting user is not permitted to perform the operation
    #[error("Permission denied: {0}")]
    Permission(String),

    /// The referenced record, link, or project does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation conflicts with the record's current state
    /// (e.g. confirming an already-confirmed manual response)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored manual-response payload could not be parsed; a re-sync
    /// is required to refresh it before retrying
    #[error("Corrupt manual response payload: {0}")]
    DataCorruption(String),

    /// A call to the external platform or file share failed
    #[error("External call failed: {0}")]
    External(String),

    /// A domain rule was violated (illegal transition, invalid value)
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A persistence-layer failure propagated from the record store
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Returns true if this error indicates a permission failure
    pub fn is_permission(&self) -> bool {
        matches!(self, WorkflowError::Permission(_))
    }

    /// Returns true if this error indicates a state conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkflowError::Conflict(_))
    }
}
