//! Exit Reason Value Object

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a lot was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Forced close at the configured end-of-day time.
    EodClose,
    /// Group-wide opening-range boundary stop.
    #[serde(alias = "RANGE_STOP")]
    InitialStop,
    /// Stop tightened by the protective cascade.
    ProtectiveStop,
    /// Trailing stop given back its allowed pullback.
    TrailingStop,
}

impl ExitReason {
    /// Whether the reason closes the whole group at once.
    #[must_use]
    pub const fn is_group_wide(&self) -> bool {
        matches!(self, Self::EodClose | Self::InitialStop)
    }

    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EodClose => "EOD_CLOSE",
            Self::InitialStop => "INITIAL_STOP",
            Self::ProtectiveStop => "PROTECTIVE_STOP",
            Self::TrailingStop => "TRAILING_STOP",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
