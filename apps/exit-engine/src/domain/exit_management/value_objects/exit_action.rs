//! Exit Action Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ExitDetails, ExitReason, PositionDirection};
use crate::domain::shared::{GroupId, PositionId, SessionTime};

/// Intent to close one lot now.
///
/// Handed to an external executor; the engine does not know whether the
/// close succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitAction {
    /// Lot to close.
    pub position_id: PositionId,
    /// Group the lot belongs to.
    pub group_id: GroupId,
    /// 1-based lot ID.
    pub lot_id: u32,
    /// Direction of the lot being closed.
    pub direction: PositionDirection,
    /// Expected fill price.
    pub exit_price: Decimal,
    /// Time of the exit decision.
    pub exit_time: SessionTime,
    /// Why the lot is closing.
    pub exit_reason: ExitReason,
    /// Realized P&L in points, signed by direction.
    pub realized_pnl: Decimal,
}

impl ExitAction {
    /// Build an action from recorded exit details.
    #[must_use]
    pub fn from_details(
        position_id: PositionId,
        group_id: GroupId,
        lot_id: u32,
        direction: PositionDirection,
        details: &ExitDetails,
    ) -> Self {
        Self {
            position_id,
            group_id,
            lot_id,
            direction,
            exit_price: details.price,
            exit_time: details.time,
            exit_reason: details.reason,
            realized_pnl: details.realized_pnl,
        }
    }

    /// Whether the exit banks a profit.
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }

    /// Realized P&L in currency for a contract point value.
    #[must_use]
    pub fn realized_value(&self, point_value: Decimal) -> Decimal {
        self.realized_pnl * point_value
    }
}
