//! Prometheus metrics for the scraper
//!
//! This module provides metrics tracking for:
//! - Probes: outcome counts and latency distribution
//! - Catalog: entries inserted
//! - Batches: committed and rolled back runs
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all scraper metrics
struct ScraperMetrics {
    probes: CounterVec,
    probe_latency: Histogram,
    catalog_inserts: Counter,
    batches: CounterVec,
}

/// Global storage for scraper metrics
static SCRAPER_METRICS: OnceLock<ScraperMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = worldping::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = ScraperMetrics {
        probes: register_counter_vec!(
            "worldping_probes_total",
            "Total latency probes by outcome",
            &["outcome"]
        )?,
        probe_latency: register_histogram!(
            "worldping_probe_latency_seconds",
            "Latency of successful probes in seconds",
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
        catalog_inserts: register_counter!(
            "worldping_catalog_inserts_total",
            "Total catalog entries created"
        )?,
        batches: register_counter_vec!(
            "worldping_batches_total",
            "Total batch runs by result",
            &["result"]
        )?,
    };

    SCRAPER_METRICS
        .set(metrics)
        .map_err(|_| "Scraper metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    SCRAPER_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one finished probe; `latency_secs` is `None` for failures
pub fn record_probe(latency_secs: Option<f64>) {
    let Some(m) = SCRAPER_METRICS.get() else {
        return;
    };
    match latency_secs {
        Some(latency) => {
            m.probes.with_label_values(&["success"]).inc();
            m.probe_latency.observe(latency);
        }
        None => m.probes.with_label_values(&["failure"]).inc(),
    }
}

/// Record catalog entries created by a synchronization pass
pub fn record_catalog_inserts(count: usize) {
    if let Some(m) = SCRAPER_METRICS.get() {
        if count > 0 {
            m.catalog_inserts.inc_by(count as f64);
        }
    }
}

/// Record a finished batch (`committed` or `rolled_back`)
pub fn record_batch(result: &str) {
    if let Some(m) = SCRAPER_METRICS.get() {
        m.batches.with_label_values(&[result]).inc();
    }
}
