//! Siteline Store - Local state persistence
//!
//! SQLite-based storage for:
//! - External project links
//! - Mirrored RFI and submittal records
//! - Sync run logs and cursors
//! - Audit trail and status history
//! - Projects and memberships
//!
//! ## Architecture
//!
//! This crate implements the `IRecordStore` port from `siteline-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`SqliteRecordStore`] - Full `IRecordStore` implementation, with
//!   file-backed and in-memory constructors that apply the schema
//! - [`StoreError`] - Error types for store operations

pub mod repository;

pub use repository::SqliteRecordStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
