//! Projects, memberships, and roles
//!
//! A `Project` is the internal aggregation unit; links hang off projects
//! and sync is scheduled per project. `ProjectMembership` carries the role
//! plus the separate response-dispatch permission: the ability to push an
//! official response to the external platform is granted per user per
//! project, independently of the role.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;
use super::newtypes::{ProjectId, UserId};

/// Role of a user within one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    /// Full control, including link administration and force moves
    Admin,
    /// May work records through the review stages
    Reviewer,
    /// Read-only
    Viewer,
}

impl ProjectRole {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::Reviewer => "reviewer",
            ProjectRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ProjectRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(ProjectRole::Admin),
            "reviewer" => Ok(ProjectRole::Reviewer),
            "viewer" => Ok(ProjectRole::Viewer),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown project role: {other}"
            ))),
        }
    }
}

/// An internal project aggregating external links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,
    /// Display name
    pub name: String,
    /// Whether the scheduler includes this project in sync passes
    pub sync_enabled: bool,
    /// Project override for the review-deadline window percentage
    pub review_window_percent: Option<u8>,
    /// Project override for the QC-deadline window percentage
    pub qc_window_percent: Option<u8>,
}

impl Project {
    /// Creates a sync-enabled project with no deadline overrides
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            sync_enabled: true,
            review_window_percent: None,
            qc_window_percent: None,
        }
    }

    /// Builder: sets the deadline-window overrides
    #[must_use]
    pub fn with_deadline_windows(mut self, review: u8, qc: u8) -> Self {
        self.review_window_percent = Some(review);
        self.qc_window_percent = Some(qc);
        self
    }
}

/// A user's membership within one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: ProjectRole,
    /// Separate grant for pushing official responses to the platform
    pub can_send_responses: bool,
}

impl ProjectMembership {
    pub fn new(project_id: ProjectId, user_id: UserId, role: ProjectRole) -> Self {
        Self {
            project_id,
            user_id,
            role,
            can_send_responses: false,
        }
    }

    /// Builder: grants the response-dispatch permission
    #[must_use]
    pub fn with_send_responses(mut self) -> Self {
        self.can_send_responses = true;
        self
    }

    /// Returns true if this member administers the project
    pub fn is_admin(&self) -> bool {
        self.role == ProjectRole::Admin
    }
}
