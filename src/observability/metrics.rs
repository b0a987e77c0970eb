//! # Metrics
//!
//! Prometheus metrics for the reconciler.
//!
//! ## Metrics Exposed
//!
//! - `encryptedssm_operations_total` - Reconciler operations by kind (put, read, delete)
//! - `encryptedssm_operation_errors_total` - Failed reconciler operations by kind
//! - `encryptedssm_operation_duration_seconds` - Duration of reconciler operations
//! - `encryptedssm_remote_calls_total` - Calls made to SSM and KMS
//! - `encryptedssm_remote_call_duration_seconds` - Duration of remote calls by service
//! - `encryptedssm_remote_call_errors_total` - Failed remote calls by service
//! - `encryptedssm_tag_mutations_total` - Tag add/remove calls issued
//! - `encryptedssm_stale_values_total` - Reads that found the stored value out of date
//! - `encryptedssm_validation_retries_total` - Reads retried while waiting for creation validation

use anyhow::Result;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder,
};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "encryptedssm_operations_total",
            "Total number of reconciler operations by kind",
        ),
        &["operation"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "encryptedssm_operation_errors_total",
            "Total number of failed reconciler operations by kind",
        ),
        &["operation"],
    )
    .expect("Failed to create OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "encryptedssm_operation_duration_seconds",
            "Duration of reconciler operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
        &["operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static REMOTE_CALLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "encryptedssm_remote_calls_total",
            "Total number of SSM and KMS API calls",
        ),
        &["service", "call"],
    )
    .expect("Failed to create REMOTE_CALLS_TOTAL metric - this should never happen")
});

static REMOTE_CALL_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "encryptedssm_remote_call_duration_seconds",
            "Duration of SSM and KMS API calls in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["service"],
    )
    .expect("Failed to create REMOTE_CALL_DURATION metric - this should never happen")
});

static REMOTE_CALL_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "encryptedssm_remote_call_errors_total",
            "Total number of failed SSM and KMS API calls",
        ),
        &["service"],
    )
    .expect("Failed to create REMOTE_CALL_ERRORS_TOTAL metric - this should never happen")
});

static TAG_MUTATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "encryptedssm_tag_mutations_total",
            "Total number of tag add/remove calls issued",
        ),
        &["kind"],
    )
    .expect("Failed to create TAG_MUTATIONS_TOTAL metric - this should never happen")
});

static STALE_VALUES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encryptedssm_stale_values_total",
        "Total number of reads where the stored value no longer matched the declared ciphertext",
    )
    .expect("Failed to create STALE_VALUES_TOTAL metric - this should never happen")
});

static VALIDATION_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "encryptedssm_validation_retries_total",
        "Total number of reads retried while waiting for creation validation",
    )
    .expect("Failed to create VALIDATION_RETRIES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REMOTE_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_CALL_DURATION.clone()))?;
    REGISTRY.register(Box::new(REMOTE_CALL_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TAG_MUTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STALE_VALUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VALIDATION_RETRIES_TOTAL.clone()))?;

    Ok(())
}

/// Render all registered metrics in the Prometheus text format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_operation(operation: &str, duration: f64, success: bool) {
    OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
    if !success {
        OPERATION_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }
}

pub fn record_remote_call(service: &str, call: &str, duration: f64) {
    REMOTE_CALLS_TOTAL.with_label_values(&[service, call]).inc();
    REMOTE_CALL_DURATION
        .with_label_values(&[service])
        .observe(duration);
}

pub fn increment_remote_call_errors(service: &str) {
    REMOTE_CALL_ERRORS_TOTAL.with_label_values(&[service]).inc();
}

pub fn increment_tag_mutations(kind: &str) {
    TAG_MUTATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_stale_values() {
    STALE_VALUES_TOTAL.inc();
}

pub fn increment_validation_retries() {
    VALIDATION_RETRIES_TOTAL.inc();
}
