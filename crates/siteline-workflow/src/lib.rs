//! Siteline Workflow - the user-facing side of the mirror
//!
//! Everything a user does to a mirrored record goes through this crate:
//!
//! - `auth`: membership and role checks shared by all operations
//! - `review`: assignment, status transitions, and change acknowledgement
//! - `respond`: official response dispatch and manual-response confirmation
//! - `links`: administration of external project links
//!
//! All operations return [`WorkflowError`](siteline_core::domain::WorkflowError),
//! and every permission denial is both rejected and written to the audit
//! trail.

pub mod auth;
pub mod links;
pub mod respond;
pub mod review;

pub use links::{LinkAdmin, LinkSettings};
pub use respond::ResponseDispatcher;
pub use review::ReviewWorkflow;
