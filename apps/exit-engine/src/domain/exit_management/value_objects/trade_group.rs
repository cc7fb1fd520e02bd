//! Trade Group Aggregate
//!
//! The sibling set of lots opened together from one breakout signal. Lots are
//! kept in ascending `lot_id` order, which is the evaluation and cascade
//! order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PositionDirection, PositionRecord, PositionStatus};
use crate::domain::exit_management::errors::DataInconsistency;
use crate::domain::shared::GroupId;

/// Opening-range metadata shared by every lot of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRange {
    /// Group ID.
    pub group_id: GroupId,
    /// Direction of the breakout.
    pub direction: PositionDirection,
    /// Opening range high.
    pub range_high: Decimal,
    /// Opening range low.
    pub range_low: Decimal,
}

impl GroupRange {
    /// Create group metadata.
    #[must_use]
    pub fn new(
        group_id: GroupId,
        direction: PositionDirection,
        range_high: Decimal,
        range_low: Decimal,
    ) -> Self {
        Self {
            group_id,
            direction,
            range_high,
            range_low,
        }
    }

    /// Range boundary opposite the direction.
    #[must_use]
    pub const fn initial_stop(&self) -> Decimal {
        self.direction.initial_stop(self.range_high, self.range_low)
    }

    /// Whether `price` touches the group-wide range stop.
    #[must_use]
    pub fn initial_stop_touched(&self, price: Decimal) -> bool {
        self.direction.stop_touched(price, self.initial_stop())
    }
}

/// Per-group snapshot for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Group ID.
    pub group_id: GroupId,
    /// Lots still ACTIVE.
    pub open_lots: usize,
    /// Lots EXITED.
    pub exited_lots: usize,
    /// Sum of realized P&L over exited lots, in points.
    pub realized_pnl: Decimal,
}

impl GroupSummary {
    /// Whether every known lot has exited.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.open_lots == 0 && self.exited_lots > 0
    }
}

/// A group and all of its known lots, active and exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeGroup {
    range: GroupRange,
    lots: Vec<PositionRecord>,
}

impl TradeGroup {
    /// Assemble a group, dropping records that do not belong to it.
    ///
    /// Returns the group along with one inconsistency per dropped record.
    /// When two records share a lot ID the exited one wins, since exit
    /// history is what the cascade relies on.
    #[must_use]
    pub fn assemble(
        range: GroupRange,
        records: Vec<PositionRecord>,
    ) -> (Self, Vec<DataInconsistency>) {
        let mut rejected = Vec::new();
        let mut lots: Vec<PositionRecord> = Vec::with_capacity(records.len());

        let mut records: Vec<_> = records
            .into_iter()
            .filter(|record| {
                if record.group_id == range.group_id {
                    true
                } else {
                    rejected.push(DataInconsistency::GroupMismatch {
                        position_id: record.position_id.clone(),
                        expected: range.group_id.clone(),
                        actual: record.group_id.clone(),
                    });
                    false
                }
            })
            .collect();
        records.sort_by_key(|r| (r.lot_id(), r.status != PositionStatus::Exited));

        for record in records {
            if lots.last().is_some_and(|l| l.lot_id() == record.lot_id()) {
                rejected.push(DataInconsistency::DuplicateLotId {
                    position_id: record.position_id.clone(),
                    group_id: range.group_id.clone(),
                    lot_id: record.lot_id(),
                });
                continue;
            }
            lots.push(record);
        }

        (Self { range, lots }, rejected)
    }

    /// Group metadata.
    #[must_use]
    pub const fn range(&self) -> &GroupRange {
        &self.range
    }

    /// Group ID.
    #[must_use]
    pub const fn group_id(&self) -> &GroupId {
        &self.range.group_id
    }

    /// Group direction.
    #[must_use]
    pub const fn direction(&self) -> PositionDirection {
        self.range.direction
    }

    /// All lots in ascending `lot_id` order.
    #[must_use]
    pub fn lots(&self) -> &[PositionRecord] {
        &self.lots
    }

    /// Lot by lot ID.
    #[must_use]
    pub fn lot(&self, lot_id: u32) -> Option<&PositionRecord> {
        self.lots.iter().find(|l| l.lot_id() == lot_id)
    }

    /// Mutable lot by lot ID.
    pub fn lot_mut(&mut self, lot_id: u32) -> Option<&mut PositionRecord> {
        self.lots.iter_mut().find(|l| l.lot_id() == lot_id)
    }

    /// Lots with a lower lot ID than `lot_id`.
    pub fn lots_before(&self, lot_id: u32) -> impl Iterator<Item = &PositionRecord> {
        self.lots.iter().filter(move |l| l.lot_id() < lot_id)
    }

    /// Number of ACTIVE lots.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lots.iter().filter(|l| l.is_active()).count()
    }

    /// Reporting snapshot.
    #[must_use]
    pub fn summary(&self) -> GroupSummary {
        let exited: Vec<_> = self.lots.iter().filter(|l| l.is_exited()).collect();
        GroupSummary {
            group_id: self.range.group_id.clone(),
            open_lots: self.active_count(),
            exited_lots: exited.len(),
            realized_pnl: exited.iter().filter_map(|l| l.realized_pnl()).sum(),
        }
    }

    /// Consume the group and return its lots.
    #[must_use]
    pub fn into_lots(self) -> Vec<PositionRecord> {
        self.lots
    }
}
