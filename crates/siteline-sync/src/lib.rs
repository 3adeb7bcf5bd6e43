//! Siteline Sync - the mirroring engine
//!
//! Pulls RFIs and submittals from the external construction platform and
//! maintains their local mirror records:
//!
//! - `fingerprint`: canonical content fingerprinting for change detection
//! - `merge`: field-ownership-aware merging of platform payloads into
//!   mirror records
//! - `manual_response`: detection of responses entered directly on the
//!   platform
//! - `orchestrator`: the run loop over projects, links, and modules

pub mod fingerprint;
pub mod manual_response;
pub mod merge;
pub mod orchestrator;

pub use merge::MergeOutcome;
pub use orchestrator::SyncOrchestrator;
