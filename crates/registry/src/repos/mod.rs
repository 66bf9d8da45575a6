//! Repository traits consumed by the upload completer.

pub mod audit;
pub mod trackers;

pub use audit::AuditLog;
pub use trackers::SessionTrackerSource;
