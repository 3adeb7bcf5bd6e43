//! Construction platform port
//!
//! Trait interface to the external construction platform that owns the
//! RFIs and submittals Siteline mirrors. The sync engine reads through
//! `list_items`; the response dispatcher writes through `update_status`,
//! `post_response`, and `upload_attachment`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ExternalProjectLink, SyncModule};

/// A response attached to an item on the platform side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResponsePayload {
    pub status: Option<String>,
    pub text: Option<String>,
    pub responded_by: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// One work item as returned by the platform listing
///
/// Everything except `external_id` is optional: the platform omits fields
/// freely and the merge layer normalizes missing values to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalItemPayload {
    /// The platform's identifier for the item
    pub external_id: String,
    pub status: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub discipline: Option<String>,
    pub assignees: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Present when someone responded to the item directly on the platform
    pub response: Option<ExternalResponsePayload>,
}

/// Port: operations against the external construction platform
#[async_trait]
pub trait IConstructionPlatform: Send + Sync {
    /// Lists all items of one module in the linked external project
    async fn list_items(
        &self,
        link: &ExternalProjectLink,
        module: SyncModule,
    ) -> anyhow::Result<Vec<ExternalItemPayload>>;

    /// Sets the platform-side status of one item
    async fn update_status(
        &self,
        link: &ExternalProjectLink,
        module: SyncModule,
        external_id: &str,
        status: &str,
    ) -> anyhow::Result<()>;

    /// Posts the official response text to one item
    async fn post_response(
        &self,
        link: &ExternalProjectLink,
        module: SyncModule,
        external_id: &str,
        text: &str,
    ) -> anyhow::Result<()>;

    /// Uploads one response attachment to the item
    async fn upload_attachment(
        &self,
        link: &ExternalProjectLink,
        module: SyncModule,
        external_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<()>;
}
