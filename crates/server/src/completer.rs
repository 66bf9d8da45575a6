//! Upload completer: finalizes recordings abandoned by their streaming node.
//!
//! A node streams a session recording as a multipart upload and completes it
//! when the session ends. If the node dies first, the upload stays open
//! forever. The completer periodically lists open uploads, checks which
//! sessions are provably alive, and completes the rest once their grace
//! period has passed. For every completed upload it then writes an upload
//! summary event and, if the session's own end event never made it into the
//! audit log, a synthesized one.
//!
//! The completer keeps no memory between ticks. Whether an upload still needs
//! work is always re-derived from the store, the tracker source and the log.
//! Several completers racing on one cluster may each emit an end event for the
//! same session; duplicates are accepted, emission is best-effort.
//!
//! Tick cadence and the emission delay run on Tokio time, while upload ages
//! and event timestamps come from the injected [`Clock`]. Tests drive the
//! former with a paused runtime and the latter with a `ManualClock`.

use crate::emission::{EmissionJob, EmissionRegistry};
use crate::error::CompleterError;
use crate::metrics;
use sealer_core::config::CompleterConfig;
use sealer_core::{Clock, SessionId, SystemClock, Upload};
use sealer_registry::{AuditLog, SessionTrackerSource};
use sealer_storage::UploadStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Outcome of one reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    /// Open uploads returned by the store.
    pub uploads_seen: usize,
    /// Uploads skipped because their session has a live tracker.
    pub active: usize,
    /// Uploads left pending inside their grace period.
    pub deferred: usize,
    /// Uploads completed this tick.
    pub completed: usize,
    /// Uploads whose completion failed.
    pub errors: usize,
}

/// Builder for [`Completer`].
///
/// The upload store, audit log and tracker source are required. Everything
/// else has a default: system clock, zero grace period, five minute check
/// interval, two minute emission delay.
#[derive(Default)]
pub struct CompleterBuilder {
    uploads: Option<Arc<dyn UploadStore>>,
    audit_log: Option<Arc<dyn AuditLog>>,
    trackers: Option<Arc<dyn SessionTrackerSource>>,
    clock: Option<Arc<dyn Clock>>,
    grace_period: Option<time::Duration>,
    check_interval: Option<Duration>,
    emission_delay: Option<Duration>,
    emissions: Option<Arc<EmissionRegistry>>,
}

impl CompleterBuilder {
    pub fn upload_store(mut self, uploads: Arc<dyn UploadStore>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    pub fn tracker_source(mut self, trackers: Arc<dyn SessionTrackerSource>) -> Self {
        self.trackers = Some(trackers);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// How long an upload whose session cannot be proven alive is left alone.
    pub fn grace_period(mut self, grace_period: time::Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    pub fn check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = Some(check_interval);
        self
    }

    /// Wait between completing an upload and reading its session's events.
    pub fn emission_delay(mut self, emission_delay: Duration) -> Self {
        self.emission_delay = Some(emission_delay);
        self
    }

    /// Take grace period, check interval and emission delay from configuration.
    pub fn config(self, config: &CompleterConfig) -> Self {
        self.grace_period(config.grace_period())
            .check_interval(config.check_interval())
            .emission_delay(config.emission_delay())
    }

    /// Track emissions in a shared registry instead of a private one.
    pub fn emission_registry(mut self, emissions: Arc<EmissionRegistry>) -> Self {
        self.emissions = Some(emissions);
        self
    }

    /// Validate the options and start the completer loop.
    ///
    /// Must be called from within a Tokio runtime. The first tick fires one
    /// check interval after this returns.
    pub fn build(self) -> Result<Completer, CompleterError> {
        let uploads = self
            .uploads
            .ok_or(CompleterError::MissingCollaborator("upload store"))?;
        let audit_log = self
            .audit_log
            .ok_or(CompleterError::MissingCollaborator("audit log"))?;
        let trackers = self
            .trackers
            .ok_or(CompleterError::MissingCollaborator("session tracker source"))?;

        let defaults = CompleterConfig::default();
        let grace_period = self.grace_period.unwrap_or_else(|| defaults.grace_period());
        let check_interval = self
            .check_interval
            .unwrap_or_else(|| defaults.check_interval());
        let emission_delay = self
            .emission_delay
            .unwrap_or_else(|| defaults.emission_delay());

        if grace_period.is_negative() {
            return Err(CompleterError::InvalidConfig(format!(
                "grace period cannot be negative, got {grace_period}"
            )));
        }
        if check_interval.is_zero() {
            return Err(CompleterError::InvalidConfig(
                "check interval must be greater than zero".to_string(),
            ));
        }

        let inner = Arc::new(CompleterInner {
            uploads,
            audit_log,
            trackers,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            grace_period,
            emission_delay,
            emissions: self
                .emissions
                .unwrap_or_else(|| Arc::new(EmissionRegistry::new())),
        });

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_loop(inner.clone(), check_interval, shutdown.clone()));

        tracing::info!(
            grace_period_secs = grace_period.whole_seconds(),
            check_interval_secs = check_interval.as_secs(),
            emission_delay_secs = emission_delay.as_secs(),
            uploads = inner.uploads.backend_name(),
            "Upload completer started"
        );

        Ok(Completer {
            inner,
            shutdown,
            handle: Mutex::new(Some(handle)),
        })
    }
}

/// Periodic reconciler of abandoned uploads.
///
/// Dropping the completer stops its loop. Emission tasks already scheduled
/// keep running; see [`EmissionRegistry::abort_emissions`].
pub struct Completer {
    inner: Arc<CompleterInner>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Completer {
    pub fn builder() -> CompleterBuilder {
        CompleterBuilder::default()
    }

    /// Run one reconciliation pass now, independently of the loop.
    pub async fn check_uploads(&self) -> Result<TickStats, CompleterError> {
        self.inner.check_uploads().await
    }

    /// Registry tracking this completer's emission tasks.
    pub fn emissions(&self) -> &Arc<EmissionRegistry> {
        &self.inner.emissions
    }

    /// Stop the loop after the current tick. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(&self) {
        self.close();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Upload completer loop terminated abnormally");
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Completer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer")
            .field("grace_period", &self.inner.grace_period)
            .field("emission_delay", &self.inner.emission_delay)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

struct CompleterInner {
    uploads: Arc<dyn UploadStore>,
    audit_log: Arc<dyn AuditLog>,
    trackers: Arc<dyn SessionTrackerSource>,
    clock: Arc<dyn Clock>,
    grace_period: time::Duration,
    emission_delay: Duration,
    emissions: Arc<EmissionRegistry>,
}

impl CompleterInner {
    #[instrument(skip(self))]
    async fn check_uploads(&self) -> Result<TickStats, CompleterError> {
        let _timer = metrics::COMPLETER_TICK_DURATION.start_timer();

        let uploads = self.uploads.list_uploads().await?;
        let active = self.active_sessions().await?;
        let now = self.clock.now();

        let mut stats = TickStats {
            uploads_seen: uploads.len(),
            ..TickStats::default()
        };

        for upload in uploads {
            if upload.completed {
                continue;
            }
            if active.contains(&upload.session_id) {
                stats.active += 1;
                continue;
            }

            // Presumed inactive: absent, expired or hidden by the registry.
            let age = upload.age(now);
            if !self.grace_period.is_zero() && age < self.grace_period {
                stats.deferred += 1;
                metrics::UPLOADS_DEFERRED.inc();
                tracing::debug!(
                    upload_id = %upload.id,
                    session_id = %upload.session_id,
                    age_secs = age.whole_seconds(),
                    "Upload within grace period, leaving pending"
                );
                continue;
            }

            match self.uploads.complete_upload(&upload).await {
                Ok(()) => {
                    stats.completed += 1;
                    metrics::UPLOADS_COMPLETED.inc();
                    tracing::info!(
                        upload_id = %upload.id,
                        session_id = %upload.session_id,
                        parts = upload.part_count(),
                        "Completed abandoned upload"
                    );
                    // Nothing was recorded, so there is nothing to summarize or end.
                    if upload.part_count() > 0 {
                        self.schedule_emission(upload).await;
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    metrics::UPLOAD_COMPLETION_ERRORS.inc();
                    tracing::warn!(
                        upload_id = %upload.id,
                        session_id = %upload.session_id,
                        error = %e,
                        "Failed to complete upload"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Session ids with a live tracker, from one snapshot.
    async fn active_sessions(&self) -> Result<HashSet<SessionId>, CompleterError> {
        match self.trackers.get_active_session_trackers().await {
            Ok(trackers) => {
                let now = self.clock.now();
                Ok(trackers
                    .into_iter()
                    .filter(|t| t.is_active_at(now))
                    .map(|t| t.session_id)
                    .collect())
            }
            Err(e) if e.presumes_inactive() => {
                tracing::warn!(
                    error = %e,
                    "Tracker snapshot unavailable, presuming every session inactive"
                );
                Ok(HashSet::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn schedule_emission(&self, upload: Upload) {
        let upload_id = upload.id;
        let job = EmissionJob {
            recording_uri: self.uploads.recording_uri(&upload),
            upload,
            audit_log: self.audit_log.clone(),
            clock: self.clock.clone(),
            delay: self.emission_delay,
        };
        self.emissions.spawn(upload_id, job.run()).await;
    }
}

async fn run_loop(inner: Arc<CompleterInner>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                metrics::COMPLETER_TICKS.inc();
                match inner.check_uploads().await {
                    Ok(stats) if stats.completed > 0 || stats.errors > 0 => {
                        tracing::info!(
                            seen = stats.uploads_seen,
                            active = stats.active,
                            deferred = stats.deferred,
                            completed = stats.completed,
                            errors = stats.errors,
                            "Upload completer tick finished"
                        );
                    }
                    Ok(stats) => {
                        tracing::debug!(seen = stats.uploads_seen, "Upload completer tick finished");
                    }
                    Err(e) => {
                        metrics::COMPLETER_TICK_FAILURES.inc();
                        tracing::error!(error = %e, "Upload completer tick failed");
                    }
                }
            }
        }
    }

    tracing::info!("Upload completer stopped");
}
