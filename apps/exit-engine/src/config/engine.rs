//! Engine configuration: end-of-day close, peak throttle and tick queue.

use serde::{Deserialize, Serialize};

use crate::domain::shared::SessionTime;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Forced end-of-day close.
    #[serde(default)]
    pub eod_close: EodCloseConfig,
    /// Minimum interval between peak updates in milliseconds (0 = every tick).
    #[serde(default = "default_peak_update_interval_ms")]
    pub peak_update_interval_ms: u64,
    /// What to do when ticks arrive faster than they are processed.
    #[serde(default)]
    pub tick_queue: TickQueuePolicy,
    /// Bound of the drop-oldest queue, rounded up to a power of two.
    #[serde(default = "default_tick_queue_capacity")]
    pub tick_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            eod_close: EodCloseConfig::default(),
            peak_update_interval_ms: default_peak_update_interval_ms(),
            tick_queue: TickQueuePolicy::default(),
            tick_queue_capacity: default_tick_queue_capacity(),
        }
    }
}

/// End-of-day close configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EodCloseConfig {
    /// Whether the close is enforced.
    #[serde(default)]
    pub enabled: bool,
    /// Session time at which every lot closes (`HH:MM:SS`).
    #[serde(default = "default_close_time")]
    pub close_time: String,
}

impl Default for EodCloseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            close_time: default_close_time(),
        }
    }
}

impl EodCloseConfig {
    /// Parsed close time, `None` when disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the close time is not `HH:MM:SS`.
    pub fn session_time(&self) -> Result<Option<SessionTime>, crate::domain::shared::SessionTimeError> {
        if !self.enabled {
            return Ok(None);
        }
        SessionTime::parse(&self.close_time).map(Some)
    }
}

/// Backpressure policy for incoming ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickQueuePolicy {
    /// Keep only the most recent unprocessed tick.
    #[default]
    CoalesceLatest,
    /// Bounded FIFO; the oldest tick is dropped when full.
    DropOldest,
}

const fn default_peak_update_interval_ms() -> u64 {
    500
}

const fn default_tick_queue_capacity() -> usize {
    64
}

fn default_close_time() -> String {
    "13:30:00".to_string()
}
