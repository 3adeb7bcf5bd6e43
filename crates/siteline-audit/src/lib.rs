//! Siteline Audit - Audit trail and status history
//!
//! Provides:
//! - `AuditLogger`: High-level service for recording audit entries
//! - `HistoryRecorder`: Append-only status-history recording
//!
//! Both wrap `IRecordStore` persistence and treat write failures as
//! non-fatal, so a broken audit table never blocks sync or workflow
//! operations.

pub mod history;
pub mod logger;

pub use history::HistoryRecorder;
pub use logger::AuditLogger;

#[cfg(test)]
mod test_support;
