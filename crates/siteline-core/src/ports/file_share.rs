//! File share port
//!
//! Response attachments are staged on an internal file share before
//! dispatch. The dispatcher reads them through this port and streams the
//! bytes to the platform.

use async_trait::async_trait;

/// Port: read access to the internal file share
#[async_trait]
pub trait IFileShare: Send + Sync {
    /// Reads the full contents of one staged file
    async fn read_file_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}
