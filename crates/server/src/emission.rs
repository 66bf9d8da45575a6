//! Asynchronous audit emission for completed uploads.
//!
//! Each finalized upload gets one spawned task that writes the upload summary
//! and, when the session never recorded its own end, a synthesized end event.
//! Tasks are tracked in an [`EmissionRegistry`] so that shutdown can wait for
//! them and panics are noticed instead of silently dropped.

use crate::error::CompleterError;
use crate::metrics;
use futures::FutureExt;
use sealer_core::event::{EventMetadata, SessionUpload};
use sealer_core::{AuditEvent, Clock, Upload, UploadId, compose_session_end};
use sealer_registry::AuditLog;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

/// What an emission task wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionOutcome {
    /// Whether a synthesized session end event was written after the summary.
    pub session_end_emitted: bool,
}

/// Emission work for one completed upload.
pub struct EmissionJob {
    pub upload: Upload,
    pub recording_uri: String,
    pub audit_log: Arc<dyn AuditLog>,
    pub clock: Arc<dyn Clock>,
    /// Wait before reading the session's events, measured on Tokio time.
    pub delay: Duration,
}

impl EmissionJob {
    /// Decide on the session end, then write the summary followed by the end.
    ///
    /// The two appends are independent: a failure after the summary leaves the
    /// summary in place, and a later completer run can still add the end.
    pub async fn run(self) -> Result<EmissionOutcome, CompleterError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let session_id = self.upload.session_id;
        let events = self.audit_log.get_session_events(session_id).await?;
        let now = self.clock.now();
        let session_end = compose_session_end(&events, now);

        let summary = AuditEvent::SessionUpload(SessionUpload {
            metadata: EventMetadata::new(session_id, now),
            upload_id: self.upload.id,
            part_count: self.upload.part_count(),
            size_bytes: self.upload.total_size(),
            recording_uri: self.recording_uri,
        });
        self.audit_log.emit(&summary).await?;

        if let Some(end) = &session_end {
            self.audit_log.emit(end).await?;
            metrics::SESSION_ENDS_SYNTHESIZED.inc();
            tracing::info!(
                session_id = %session_id,
                upload_id = %self.upload.id,
                event = end.event_type(),
                "Emitted session end on behalf of vanished node"
            );
        }

        Ok(EmissionOutcome {
            session_end_emitted: session_end.is_some(),
        })
    }
}

/// Counters describing every emission task the registry has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmissionStats {
    pub scheduled: u64,
    pub emitted: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub panicked: u64,
}

impl EmissionStats {
    /// Tasks that have reached a final state.
    pub fn finished(&self) -> u64 {
        self.emitted + self.failed + self.cancelled + self.panicked
    }
}

#[derive(Debug, Default)]
struct EmissionCounters {
    scheduled: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    panicked: AtomicU64,
}

impl EmissionCounters {
    fn snapshot(&self) -> EmissionStats {
        EmissionStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Registry for tracking emission tasks and detecting panics.
///
/// Emission tasks outlive the tick that scheduled them and the completer loop
/// itself. They share one cancellation scope, separate from the loop's, that
/// is only cancelled by [`abort_emissions`](Self::abort_emissions).
///
/// Every task settles its own outcome, panics included, and removes itself
/// from the registry when it ends. Dropping a [`wait_idle`](Self::wait_idle)
/// future therefore never loses track of a task.
pub struct EmissionRegistry {
    /// In-flight tasks by sequence number.
    tasks: Arc<Mutex<HashMap<u64, UploadId>>>,
    next_task: AtomicU64,
    counters: Arc<EmissionCounters>,
    /// Number of tasks that have not settled yet.
    active: Arc<watch::Sender<usize>>,
    cancel: CancellationToken,
}

impl EmissionRegistry {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_task: AtomicU64::new(0),
            counters: Arc::new(EmissionCounters::default()),
            active: Arc::new(active),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn and register the emission task of an upload.
    pub async fn spawn<F>(&self, upload_id: UploadId, work: F)
    where
        F: Future<Output = Result<EmissionOutcome, CompleterError>> + Send + 'static,
    {
        let counters = self.counters.clone();
        let cancel = self.cancel.clone();
        let tasks = self.tasks.clone();
        let active = self.active.clone();
        let task = self.next_task.fetch_add(1, Ordering::Relaxed);

        counters.scheduled.fetch_add(1, Ordering::Relaxed);
        metrics::EMISSIONS_ACTIVE.inc();
        self.active.send_modify(|n| *n += 1);

        // Registered before the task can run, so its own removal always finds it.
        let mut registered = self.tasks.lock().await;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    counters.cancelled.fetch_add(1, Ordering::Relaxed);
                    metrics::record_emission_outcome("cancelled");
                    tracing::warn!(upload_id = %upload_id, "Emission cancelled before completion");
                }
                result = AssertUnwindSafe(work).catch_unwind() => match result {
                    Ok(Ok(outcome)) => {
                        counters.emitted.fetch_add(1, Ordering::Relaxed);
                        metrics::record_emission_outcome("emitted");
                        tracing::debug!(
                            upload_id = %upload_id,
                            session_end_emitted = outcome.session_end_emitted,
                            "Emission finished"
                        );
                    }
                    Ok(Err(e)) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        metrics::record_emission_outcome("failed");
                        tracing::error!(upload_id = %upload_id, error = %e, "Emission failed");
                    }
                    Err(payload) => {
                        counters.panicked.fetch_add(1, Ordering::Relaxed);
                        metrics::record_emission_outcome("panicked");
                        tracing::error!(
                            upload_id = %upload_id,
                            panic = panic_message(payload.as_ref()),
                            "Emission task panicked"
                        );
                    }
                },
            }

            tasks.lock().await.remove(&task);
            metrics::EMISSIONS_ACTIVE.dec();
            active.send_modify(|n| *n = n.saturating_sub(1));
        });
        registered.insert(task, upload_id);
    }

    /// Wait until every task, including ones spawned meanwhile, has settled.
    ///
    /// Cancel safe: abandoning the wait leaves the tasks registered.
    pub async fn wait_idle(&self) -> EmissionStats {
        let mut active = self.active.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = active.wait_for(|n| *n == 0).await;
        self.stats()
    }

    /// Cancel every in-flight and future emission task.
    pub fn abort_emissions(&self) {
        self.cancel.cancel();
    }

    /// Number of tasks still running.
    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Uploads whose emission is still running.
    pub async fn in_flight_uploads(&self) -> Vec<UploadId> {
        self.tasks.lock().await.values().copied().collect()
    }

    pub fn stats(&self) -> EmissionStats {
        self.counters.snapshot()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl Default for EmissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmissionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmissionRegistry")
            .field("stats", &self.stats())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
