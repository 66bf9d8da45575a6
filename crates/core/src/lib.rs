//! Core domain types and shared logic for sealer.
//!
//! This crate defines the data model used across all other crates:
//! - Upload and part records for session recordings
//! - Session identifiers, kinds and liveness trackers
//! - Audit events and the session-end composer
//! - Clock abstraction and configuration

pub mod clock;
pub mod composer;
pub mod config;
pub mod error;
pub mod event;
pub mod hash;
pub mod session;
pub mod upload;

pub use clock::{Clock, ManualClock, SystemClock};
pub use composer::compose_session_end;
pub use error::{Error, Result};
pub use event::AuditEvent;
pub use hash::PartDigest;
pub use session::{SessionId, SessionKind, SessionTracker};
pub use upload::{Part, Upload, UploadId};
