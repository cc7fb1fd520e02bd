//! Peak and Stop Update Value Objects

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::PositionId;

/// A change of peak price produced by the peak tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakUpdate {
    /// Lot whose peak moved.
    pub position_id: PositionId,
    /// Previous peak.
    pub old_peak: Decimal,
    /// New peak.
    pub new_peak: Decimal,
    /// Absolute size of the move.
    pub improvement: Decimal,
}

/// A protective stop set on a later lot by the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopUpdate {
    /// Lot receiving the stop.
    pub position_id: PositionId,
    /// Its lot ID.
    pub lot_id: u32,
    /// Stop level before the update.
    pub old_stop: Decimal,
    /// New stop level.
    pub new_stop: Decimal,
    /// Sum of realized P&L of all earlier lots.
    pub cumulative_profit: Decimal,
    /// Multiplier applied to the cumulative profit.
    pub multiplier: Decimal,
}

impl StopUpdate {
    /// Distance from entry the stop was placed at.
    #[must_use]
    pub fn stop_amount(&self) -> Decimal {
        self.cumulative_profit * self.multiplier
    }
}
