//! Prometheus metrics for the upload completer.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no session or upload identifiers, only aggregate counts.
//! Keep the endpoint network-restricted to the scrapers that need it.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Reconciliation tick metrics
pub static COMPLETER_TICKS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealer_completer_ticks_total",
        "Total number of reconciliation ticks run",
    )
    .expect("metric creation failed")
});

pub static COMPLETER_TICK_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealer_completer_tick_failures_total",
        "Total number of ticks aborted by a listing or tracker snapshot failure",
    )
    .expect("metric creation failed")
});

pub static COMPLETER_TICK_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "sealer_completer_tick_duration_seconds",
            "Time taken by one reconciliation tick",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("metric creation failed")
});

// Upload metrics
pub static UPLOADS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealer_uploads_completed_total",
        "Total number of abandoned uploads finalized",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_COMPLETION_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealer_upload_completion_errors_total",
        "Total number of failed upload finalization attempts",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_DEFERRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealer_uploads_deferred_total",
        "Total number of times an upload was left pending inside its grace period",
    )
    .expect("metric creation failed")
});

// Emission metrics
pub static EMISSIONS_ACTIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "sealer_emissions_active",
        "Number of audit emission tasks currently in flight",
    )
    .expect("metric creation failed")
});

pub static EMISSIONS_FINISHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sealer_emissions_finished_total",
            "Total number of audit emission tasks finished, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static SESSION_ENDS_SYNTHESIZED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealer_session_ends_synthesized_total",
        "Total number of session end events written on behalf of a vanished node",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(COMPLETER_TICKS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COMPLETER_TICK_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COMPLETER_TICK_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_COMPLETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_COMPLETION_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_DEFERRED.clone()))
            .expect("metric registration failed");

        // Emission metrics
        REGISTRY
            .register(Box::new(EMISSIONS_ACTIVE.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EMISSIONS_FINISHED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SESSION_ENDS_SYNTHESIZED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Helper to record how an emission task ended.
pub fn record_emission_outcome(outcome: &str) {
    EMISSIONS_FINISHED.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // This would panic if any metric creation failed
        register_metrics();
        register_metrics();

        record_emission_outcome("emitted");
        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"sealer_emissions_finished_total".to_string()));
        assert!(names.contains(&"sealer_completer_ticks_total".to_string()));
    }
}
