//! Payload merging
//!
//! Turns one platform listing payload into either a new mirror record or a
//! patch against the existing one. The merge respects field ownership
//! strictly: only externally-owned attributes and sync metadata are ever
//! written, and updates are expressed as [`RecordPatch`] operations, which
//! cannot touch the internal review state at all.

use chrono::{DateTime, Utc};

use siteline_core::domain::{
    ChangeSummary, DomainError, ExternalAttributes, ExternalId, ExternalProjectLink,
    ExternalRecord, PatchField, RecordPatch, SyncModule,
};
use siteline_core::ports::ExternalItemPayload;

use crate::fingerprint;
use crate::manual_response::{self, ManualDetection};

/// Result of merging one payload
#[derive(Debug)]
pub enum MergeOutcome {
    /// First sighting: a fresh record to insert
    Created(ExternalRecord),
    /// Known item: a patch to apply
    Updated {
        patch: RecordPatch,
        /// True if the content fingerprint moved
        changed: bool,
        /// Present when `changed` and at least one summarized field moved
        summary: Option<ChangeSummary>,
    },
}

/// Normalizes a raw listing payload into the attribute group
///
/// The platform omits fields freely; missing values get explicit defaults
/// here so the rest of the pipeline never deals with half-formed data.
pub fn normalize_payload(payload: &ExternalItemPayload) -> ExternalAttributes {
    ExternalAttributes {
        status: payload
            .status
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        title: payload
            .title
            .clone()
            .unwrap_or_else(|| "(untitled)".to_string()),
        description: payload.description.clone().unwrap_or_default(),
        priority: payload.priority.clone(),
        due_date: payload.due_date,
        discipline: payload.discipline.clone(),
        assignees: payload.assignees.clone(),
        external_created_at: payload.created_at,
        external_updated_at: payload.updated_at,
    }
}

/// Merges one payload against the local state of its item
pub fn merge(
    link: &ExternalProjectLink,
    module: SyncModule,
    payload: &ExternalItemPayload,
    existing: Option<&ExternalRecord>,
    now: DateTime<Utc>,
) -> Result<MergeOutcome, DomainError> {
    let attributes = normalize_payload(payload);
    let fingerprint = fingerprint::compute(&attributes);
    let detection = manual_response::detect(payload.response.as_ref(), existing, now);

    match existing {
        None => {
            let external_id = ExternalId::new(payload.external_id.clone())?;
            let mut record = ExternalRecord::new(
                *link.id(),
                *link.project_id(),
                module,
                external_id,
                attributes,
                fingerprint,
                now,
            );
            if let ManualDetection::Detected {
                payload_json,
                detected_at,
            } = detection
            {
                record.record_manual_response(payload_json, detected_at);
            }
            Ok(MergeOutcome::Created(record))
        }
        Some(record) => {
            let mut patch = RecordPatch::new().with(PatchField::LastSeenAt(now));
            let changed = &fingerprint != record.fingerprint();
            let mut summary = None;

            if changed {
                let diff = fingerprint::diff(record.attributes(), &attributes);
                patch.push(PatchField::Attributes(attributes));
                patch.push(PatchField::Fingerprint(fingerprint));
                patch.push(PatchField::UnacknowledgedChange {
                    summary: diff.clone(),
                    at: now,
                });
                if !diff.is_empty() {
                    summary = Some(diff);
                }
            }

            match detection {
                ManualDetection::Detected {
                    payload_json,
                    detected_at,
                } => patch.push(PatchField::ManualResponseDetected {
                    payload: payload_json,
                    detected_at,
                }),
                ManualDetection::Refreshed { payload_json } => {
                    patch.push(PatchField::ManualResponsePayloadRefreshed {
                        payload: payload_json,
                    })
                }
                ManualDetection::None => {}
            }

            Ok(MergeOutcome::Updated {
                patch,
                changed,
                summary,
            })
        }
    }
}
