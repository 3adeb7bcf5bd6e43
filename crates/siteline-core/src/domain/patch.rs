//! Sync-side record updates as explicit patch operations
//!
//! The sync engine never writes a whole record back. It describes its
//! updates as a [`RecordPatch`]: an ordered list of [`PatchField`]
//! operations, each naming one sync-writable field group. Internally-owned
//! review fields have no patch variant at all, so a sync write that would
//! clobber workflow state is unrepresentable rather than merely forbidden.

use chrono::{DateTime, Utc};

use super::newtypes::Fingerprint;
use super::record::{ChangeSummary, ExternalAttributes};

/// One sync-writable update to a mirrored record
#[derive(Debug, Clone, PartialEq)]
pub enum PatchField {
    /// Replace the externally-owned attribute group verbatim
    Attributes(ExternalAttributes),
    /// Replace the content fingerprint
    Fingerprint(Fingerprint),
    /// Stamp the last-seen time
    LastSeenAt(DateTime<Utc>),
    /// Raise the unacknowledged-change flag with its diff summary
    UnacknowledgedChange {
        summary: ChangeSummary,
        at: DateTime<Utc>,
    },
    /// Clear the unacknowledged-change flag (explicit user action)
    AcknowledgeChange,
    /// Flag a newly detected manual response
    ///
    /// Stores the captured payload and stamps the detection time. The
    /// store must keep an existing detection time if one is already set.
    ManualResponseDetected {
        payload: String,
        detected_at: DateTime<Utc>,
    },
    /// Refresh the captured payload of an already-detected manual response
    /// without touching the detection time
    ManualResponsePayloadRefreshed { payload: String },
}

/// An ordered list of patch operations applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    fields: Vec<PatchField>,
}

impl RecordPatch {
    /// Creates an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one operation to the patch
    pub fn push(&mut self, field: PatchField) {
        self.fields.push(field);
    }

    /// Builder-style variant of [`push`](Self::push)
    #[must_use]
    pub fn with(mut self, field: PatchField) -> Self {
        self.fields.push(field);
        self
    }

    /// Iterates the operations in application order
    pub fn iter(&self) -> impl Iterator<Item = &PatchField> {
        self.fields.iter()
    }

    /// Returns true if the patch contains no operations
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of operations
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<'a> IntoIterator for &'a RecordPatch {
    type Item = &'a PatchField;
    type IntoIter = std::slice::Iter<'a, PatchField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
