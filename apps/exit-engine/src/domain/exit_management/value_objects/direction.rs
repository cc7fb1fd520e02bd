//! Position Direction Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction shared by every lot of a trade group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionDirection {
    /// Long position (buy to open).
    Long,
    /// Short position (sell to open).
    Short,
}

impl PositionDirection {
    /// Realized P&L in points, positive when `exit` is favorable to `entry`.
    #[must_use]
    pub fn signed_pnl(self, entry: Decimal, exit: Decimal) -> Decimal {
        match self {
            Self::Long => exit - entry,
            Self::Short => entry - exit,
        }
    }

    /// Whether `candidate` is strictly more favorable than `reference`.
    #[must_use]
    pub fn improves(self, candidate: Decimal, reference: Decimal) -> bool {
        match self {
            Self::Long => candidate > reference,
            Self::Short => candidate < reference,
        }
    }

    /// Whether `price` touches or breaches a stop at `stop`.
    ///
    /// Touch counts: LONG triggers on `price <= stop`, SHORT on `price >= stop`.
    #[must_use]
    pub fn stop_touched(self, price: Decimal, stop: Decimal) -> bool {
        match self {
            Self::Long => price <= stop,
            Self::Short => price >= stop,
        }
    }

    /// Whether `price` has moved at least `distance` in favor from `entry`.
    #[must_use]
    pub fn reached_favorable(self, price: Decimal, entry: Decimal, distance: Decimal) -> bool {
        match self {
            Self::Long => price >= entry + distance,
            Self::Short => price <= entry - distance,
        }
    }

    /// Range boundary opposite the direction (the group's initial stop).
    #[must_use]
    pub const fn initial_stop(self, range_high: Decimal, range_low: Decimal) -> Decimal {
        match self {
            Self::Long => range_low,
            Self::Short => range_high,
        }
    }

    /// Stop level `distance` points against the position from `entry`.
    #[must_use]
    pub fn stop_from_entry(self, entry: Decimal, distance: Decimal) -> Decimal {
        match self {
            Self::Long => entry - distance,
            Self::Short => entry + distance,
        }
    }

    /// The tighter of two stop levels (nearer to a favorable price).
    #[must_use]
    pub fn tighter_stop(self, a: Decimal, b: Decimal) -> Decimal {
        match self {
            Self::Long => a.max(b),
            Self::Short => a.min(b),
        }
    }

    /// String form used in logs and metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
