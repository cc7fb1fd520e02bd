//! Observability module for metrics.
//!
//! Prometheus counters and gauges for exit decisions. Structured logging is
//! set up in [`crate::telemetry`].

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_from_settings, init_metrics, record_cascade_skip,
    record_cascade_update, record_exit_action, record_group_failure, record_lot_skipped,
    record_peak_update, record_tick_duration, record_trailing_activation, update_active_lots,
};
