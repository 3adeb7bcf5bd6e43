//! Content fingerprinting for change detection
//!
//! The fingerprint is a SHA-256 over a canonical projection of the
//! externally-owned fields. Canonicalization goes through a fixed struct,
//! so the hash never depends on the key order or formatting of whatever
//! JSON the platform happened to send. Equal projected fields always
//! produce equal fingerprints.

use serde::Serialize;
use sha2::{Digest, Sha256};

use siteline_core::domain::{
    ChangeSummary, ExternalAttributes, FieldDelta, Fingerprint,
};

/// The canonical projection hashed into the fingerprint
///
/// Field order is fixed by this struct; serialization is compact JSON.
#[derive(Serialize)]
struct FingerprintProjection<'a> {
    status: &'a str,
    title: &'a str,
    description: &'a str,
    priority: Option<&'a str>,
    due_date: Option<String>,
    assignees: &'a [String],
    external_updated_at: Option<String>,
}

/// Computes the content fingerprint of one set of external attributes
pub fn compute(attributes: &ExternalAttributes) -> Fingerprint {
    let projection = FingerprintProjection {
        status: &attributes.status,
        title: &attributes.title,
        description: &attributes.description,
        priority: attributes.priority.as_deref(),
        due_date: attributes.due_date.map(|d| d.to_string()),
        assignees: &attributes.assignees,
        external_updated_at: attributes.external_updated_at.map(|t| t.to_rfc3339()),
    };
    // Serializing a fixed struct cannot fail
    let canonical = serde_json::to_vec(&projection).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");

    // 64 lowercase hex chars by construction
    Fingerprint::new(hex).expect("SHA-256 hex digest is a valid fingerprint")
}

/// Builds the reviewer-facing diff between two attribute sets
///
/// Only the four fields reviewers act on are summarized; the fingerprint
/// remains the authority on whether anything changed at all.
pub fn diff(old: &ExternalAttributes, new: &ExternalAttributes) -> ChangeSummary {
    let mut summary = ChangeSummary::default();

    if old.status != new.status {
        summary.status = Some(FieldDelta {
            old: Some(old.status.clone()),
            new: Some(new.status.clone()),
        });
    }
    if old.title != new.title {
        summary.title = Some(FieldDelta {
            old: Some(old.title.clone()),
            new: Some(new.title.clone()),
        });
    }
    if old.due_date != new.due_date {
        summary.due_date = Some(FieldDelta {
            old: old.due_date.map(|d| d.to_string()),
            new: new.due_date.map(|d| d.to_string()),
        });
    }
    if old.priority != new.priority {
        summary.priority = Some(FieldDelta {
            old: old.priority.clone(),
            new: new.priority.clone(),
        });
    }

    summary
}
