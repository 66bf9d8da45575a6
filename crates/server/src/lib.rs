//! Upload completer daemon for session recordings.
//!
//! This crate provides:
//! - The [`Completer`] reconciliation loop that finalizes abandoned uploads
//! - Asynchronous audit emission tracked by an [`EmissionRegistry`]
//! - Prometheus metrics and a small HTTP surface (health, metrics)

pub mod completer;
pub mod emission;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use completer::{Completer, CompleterBuilder, TickStats};
pub use emission::{EmissionRegistry, EmissionStats};
pub use error::{ApiError, CompleterError};
pub use routes::create_router;
pub use state::AppState;
