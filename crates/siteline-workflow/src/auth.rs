//! Membership and role checks
//!
//! Shared authorization helpers. The response-dispatch permission is
//! deliberately not checked here: it is a per-membership grant, separate
//! from the role, and the dispatcher checks it itself so the denial can be
//! audited with the operation context.

use siteline_core::domain::{ProjectId, ProjectMembership, UserId, WorkflowError};
use siteline_core::ports::IRecordStore;

/// Resolves the acting user's membership in the project
///
/// A user without a membership row is treated as a permission failure, not
/// a not-found: the project may well exist, the user just has no business
/// in it.
pub async fn require_membership(
    store: &dyn IRecordStore,
    project_id: &ProjectId,
    user_id: &UserId,
) -> Result<ProjectMembership, WorkflowError> {
    store
        .get_membership(project_id, user_id)
        .await?
        .ok_or_else(|| {
            WorkflowError::Permission(format!("User {user_id} is not a member of this project"))
        })
}

/// Requires the membership to carry the admin role
pub fn require_admin(membership: &ProjectMembership) -> Result<(), WorkflowError> {
    if !membership.is_admin() {
        return Err(WorkflowError::Permission(format!(
            "Operation requires the admin role, user has {}",
            membership.role
        )));
    }
    Ok(())
}
