//! Port definitions (trait interfaces for adapters)
//!
//! Ports are the boundary of the hexagonal core. Adapter crates implement
//! them; the sync and workflow crates depend only on the traits.

pub mod construction_platform;
pub mod file_share;
pub mod record_store;

pub use construction_platform::{
    ExternalItemPayload, ExternalResponsePayload, IConstructionPlatform,
};
pub use file_share::IFileShare;
pub use record_store::IRecordStore;
