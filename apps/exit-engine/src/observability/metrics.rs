//! Prometheus metrics for the exit engine.
//!
//! Counters for exits, peak moves, trailing activations and cascade
//! outcomes; a tick latency histogram and an active-lot gauge.
//!
//! # Example
//!
//! ```ignore
//! use exit_engine::observability::{init_from_settings, record_exit_action};
//!
//! let installed = init_from_settings(&config.observability.metrics)?;
//!
//! record_exit_action(ExitReason::TrailingStop);
//! ```

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;

use crate::config::MetricsSettings;
use crate::domain::exit_management::value_objects::{CascadeSkip, ExitReason};

const TICK_DURATION: &str = "exit_engine_tick_duration_seconds";

/// Exporter settings resolved from [`MetricsSettings`].
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Where `/metrics` is served.
    pub listen_addr: SocketAddr,
    /// Buckets for the tick duration histogram, in seconds.
    pub tick_buckets: Vec<f64>,
}

impl MetricsConfig {
    /// Exporter on `listen_addr` with the default tick buckets.
    #[must_use]
    pub fn with_addr(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            // A tick pass is in-memory work: 5us to 50ms.
            tick_buckets: vec![
                0.000_005, 0.000_025, 0.0001, 0.000_25, 0.001, 0.0025, 0.01, 0.05,
            ],
        }
    }
}

impl TryFrom<&MetricsSettings> for MetricsConfig {
    type Error = MetricsError;

    fn try_from(settings: &MetricsSettings) -> Result<Self, Self::Error> {
        settings
            .socket_addr()
            .map(Self::with_addr)
            .map_err(|e| MetricsError::Configuration(format!("{}: {e}", settings.listen_addr)))
    }
}

/// Install the Prometheus recorder and its HTTP listener.
///
/// # Errors
///
/// Fails if the buckets are rejected or the listener cannot be installed
/// (for example when a recorder is already set).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets_for_metric(Matcher::Full(TICK_DURATION.to_string()), &config.tick_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "Metrics endpoint listening");
    Ok(())
}

/// Install the exporter if `settings.enabled`; returns whether it was installed.
///
/// # Errors
///
/// See [`init_metrics`].
pub fn init_from_settings(settings: &MetricsSettings) -> Result<bool, MetricsError> {
    if !settings.enabled {
        tracing::debug!("Metrics exporter disabled");
        return Ok(false);
    }
    init_metrics(&MetricsConfig::try_from(settings)?)?;
    Ok(true)
}

/// Metrics exporter failures.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Bad listen address or bucket layout.
    #[error("invalid metrics exporter settings: {0}")]
    Configuration(String),
    /// The recorder could not be installed.
    #[error("failed to install metrics exporter: {0}")]
    Installation(String),
}

// ============================================================================
// Exit Metrics
// ============================================================================

/// Record an emitted exit action.
pub fn record_exit_action(reason: ExitReason) {
    counter!("exit_engine_exit_actions_total", "reason" => reason.as_str()).increment(1);
}

/// Record a peak price move.
pub fn record_peak_update() {
    counter!("exit_engine_peak_updates_total").increment(1);
}

/// Record a trailing stop being armed.
pub fn record_trailing_activation() {
    counter!("exit_engine_trailing_activations_total").increment(1);
}

// ============================================================================
// Cascade Metrics
// ============================================================================

/// Record a protective stop set by the cascade.
pub fn record_cascade_update() {
    counter!("exit_engine_cascade_updates_total").increment(1);
}

/// Record a cascade that did not apply.
pub fn record_cascade_skip(skip: CascadeSkip) {
    counter!("exit_engine_cascade_skips_total", "kind" => skip.as_str()).increment(1);
}

// ============================================================================
// Engine Metrics
// ============================================================================

/// Record a lot skipped for inconsistent data.
pub fn record_lot_skipped() {
    counter!("exit_engine_lots_skipped_total").increment(1);
}

/// Record a group whose tick failed in persistence or dispatch.
///
/// # Arguments
///
/// * `stage` - Where it failed (`"load"`, `"persist"`, `"dispatch"`)
pub fn record_group_failure(stage: &'static str) {
    counter!("exit_engine_group_failures_total", "stage" => stage).increment(1);
}

/// Record how long one tick took end to end.
pub fn record_tick_duration(seconds: f64) {
    histogram!(TICK_DURATION).record(seconds);
}

/// Update the active lots gauge.
pub fn update_active_lots(count: usize) {
    gauge!("exit_engine_active_lots").set(count as f64);
}
