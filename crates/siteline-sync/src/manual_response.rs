//! Manual response detection
//!
//! A "manual response" is a response entered directly on the external
//! platform, bypassing Siteline's review workflow. The detector compares
//! an incoming payload with the record's local state and decides whether
//! to flag a new detection, refresh an already-captured payload, or do
//! nothing.
//!
//! Rules:
//! - A response on an item whose official response was dispatched by
//!   Siteline is our own response echoed back, never a manual one.
//! - Once a manual response is confirmed, the record stays closed; later
//!   payload changes are not re-flagged.
//! - The detection time is first-detected: refreshing the captured payload
//!   keeps the original `detectedAt`.

use chrono::{DateTime, Utc};

use siteline_core::domain::{ExternalRecord, ManualResponsePayload};
use siteline_core::ports::ExternalResponsePayload;

/// Outcome of manual-response detection for one incoming payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualDetection {
    /// Nothing to flag
    None,
    /// A manual response was detected for the first time
    Detected {
        payload_json: String,
        detected_at: DateTime<Utc>,
    },
    /// The captured payload of an existing detection was refreshed
    Refreshed { payload_json: String },
}

/// Runs detection for one incoming platform response against the local
/// record state (`None` for the create path).
pub fn detect(
    response: Option<&ExternalResponsePayload>,
    existing: Option<&ExternalRecord>,
    now: DateTime<Utc>,
) -> ManualDetection {
    let Some(response) = response else {
        return ManualDetection::None;
    };
    // An empty response object carries no information worth flagging
    if response.status.is_none() && response.text.is_none() {
        return ManualDetection::None;
    }

    match existing {
        None => ManualDetection::Detected {
            payload_json: capture(response, now),
            detected_at: now,
        },
        Some(record) => {
            if record.review().response_sent_at.is_some() {
                // Our own dispatched response echoed back
                return ManualDetection::None;
            }
            if record.sync().manual_response_confirmed_at.is_some() {
                // Already confirmed and closed; no re-flag
                return ManualDetection::None;
            }
            if record.sync().has_manual_response {
                let detected_at = record
                    .sync()
                    .manual_response_detected_at
                    .unwrap_or(now);
                ManualDetection::Refreshed {
                    payload_json: capture(response, detected_at),
                }
            } else {
                ManualDetection::Detected {
                    payload_json: capture(response, now),
                    detected_at: now,
                }
            }
        }
    }
}

/// Serializes the captured payload with the given detection time
fn capture(response: &ExternalResponsePayload, detected_at: DateTime<Utc>) -> String {
    let payload = ManualResponsePayload {
        status: response.status.clone(),
        text: response.text.clone(),
        responded_by: response.responded_by.clone(),
        responded_at: response.responded_at.map(|t| t.to_rfc3339()),
        detected_at: Some(detected_at.to_rfc3339()),
    };
    payload.to_json().unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteline_core::domain::{
        ExternalAttributes, ExternalId, Fingerprint, LinkId, ProjectId, SyncModule, UserId,
    };

    fn response(text: &str) -> ExternalResponsePayload {
        ExternalResponsePayload {
            status: Some("answered".to_string()),
            text: Some(text.to_string()),
            responded_by: Some("field.engineer".to_string()),
            responded_at: None,
        }
    }

    fn record() -> ExternalRecord {
        ExternalRecord::new(
            LinkId::new(),
            ProjectId::new(),
            SyncModule::Rfi,
            ExternalId::new("RFI-1").unwrap(),
            ExternalAttributes::default(),
            Fingerprint::new("a".repeat(64)).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_no_response_no_detection() {
        assert_eq!(detect(None, Some(&record()), Utc::now()), ManualDetection::None);
    }

    #[test]
    fn test_empty_response_object_is_ignored() {
        let empty = ExternalResponsePayload::default();
        assert_eq!(
            detect(Some(&empty), Some(&record()), Utc::now()),
            ManualDetection::None
        );
    }

    #[test]
    fn test_detects_on_unflagged_record() {
        let now = Utc::now();
        let outcome = detect(Some(&response("Approved")), Some(&record()), now);
        match outcome {
            ManualDetection::Detected {
                payload_json,
                detected_at,
            } => {
                assert_eq!(detected_at, now);
                let payload = ManualResponsePayload::from_json(&payload_json).unwrap();
                assert_eq!(payload.text.as_deref(), Some("Approved"));
                assert_eq!(payload.detected_at, Some(now.to_rfc3339()));
            }
            other => panic!("expected Detected, got {other:?}"),
        }
    }

    #[test]
    fn test_detects_on_create_path() {
        let outcome = detect(Some(&response("Approved")), None, Utc::now());
        assert!(matches!(outcome, ManualDetection::Detected { .. }));
    }

    #[test]
    fn test_own_dispatched_response_is_not_manual() {
        let mut rec = record();
        rec.transition_status(siteline_core::domain::ReviewStatus::AssignedForReview)
            .unwrap();
        rec.mark_response_sent("answered", "Our response", UserId::new(), Utc::now())
            .unwrap();

        let outcome = detect(Some(&response("Our response")), Some(&rec), Utc::now());
        assert_eq!(outcome, ManualDetection::None);
    }

    #[test]
    fn test_refresh_preserves_original_detection_time() {
        let mut rec = record();
        let first = Utc::now() - chrono::Duration::hours(2);
        rec.record_manual_response("{}".to_string(), first);

        let outcome = detect(Some(&response("Updated text")), Some(&rec), Utc::now());
        match outcome {
            ManualDetection::Refreshed { payload_json } => {
                let payload = ManualResponsePayload::from_json(&payload_json).unwrap();
                assert_eq!(payload.detected_at, Some(first.to_rfc3339()));
                assert_eq!(payload.text.as_deref(), Some("Updated text"));
            }
            other => panic!("expected Refreshed, got {other:?}"),
        }
    }

    #[test]
    fn test_no_reflag_after_confirmation() {
        let mut rec = record();
        rec.record_manual_response("{}".to_string(), Utc::now());
        let payload = ManualResponsePayload {
            status: Some("answered".to_string()),
            ..Default::default()
        };
        rec.apply_manual_confirmation(&payload, UserId::new(), Utc::now())
            .unwrap();

        let outcome = detect(Some(&response("Even newer")), Some(&rec), Utc::now());
        assert_eq!(outcome, ManualDetection::None);
    }

    #[test]
    fn test_detection_is_idempotent_across_repeated_polls() {
        let now = Utc::now();
        let rec = record();
        let first = detect(Some(&response("Approved")), Some(&rec), now);
        let second = detect(Some(&response("Approved")), Some(&rec), now);
        assert_eq!(first, second);
    }
}
