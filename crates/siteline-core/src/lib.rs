//! Siteline Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ExternalRecord`, `ExternalProjectLink`, `RunLog`,
//!   `AuditEntry`, `StatusHistoryEntry`, `Project`/`ProjectMembership`
//! - **State machine** - the internal review workflow states for mirrored items
//! - **Port definitions** - Traits for adapters: `IConstructionPlatform`,
//!   `IRecordStore`, `IFileShare`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement. The sync and
//! workflow crates orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
