//! Position Record Entity
//!
//! Mutable per-lot runtime state. The engine is the only writer of the risk
//! fields (`peak_price`, `current_stop_loss`, both activation flags, status
//! and the exit fields).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ExitReason, PositionDirection, RuleConfig};
use crate::domain::exit_management::errors::DataInconsistency;
use crate::domain::shared::{GroupId, PositionId, SessionTime};

/// Lifecycle status of a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// Order placed, fill not yet confirmed.
    Pending,
    /// Filled and risk-managed.
    Active,
    /// Closed. Terminal.
    Exited,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Exited => write!(f, "EXITED"),
        }
    }
}

/// Exit fields, written exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitDetails {
    /// Why the lot was closed.
    pub reason: ExitReason,
    /// Price the lot is assumed filled at.
    pub price: Decimal,
    /// Wall-clock time of the exit decision.
    pub time: SessionTime,
    /// Realized P&L in points, signed by direction.
    pub realized_pnl: Decimal,
}

/// Runtime state of one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Unique position ID.
    pub position_id: PositionId,
    /// Group this lot belongs to.
    pub group_id: GroupId,
    /// Direction, duplicated from the group.
    pub direction: PositionDirection,
    /// Fill price. `None` until the fill is confirmed.
    pub entry_price: Option<Decimal>,
    /// Most favorable price seen since trailing was armed.
    pub peak_price: Option<Decimal>,
    /// Current stop level.
    pub current_stop_loss: Decimal,
    /// One-way latch: trailing stop armed.
    pub trailing_activated: bool,
    /// Protective cascade has set `current_stop_loss`.
    pub protection_activated: bool,
    /// Lifecycle status.
    pub status: PositionStatus,
    /// Exit fields, set once at exit.
    pub exit: Option<ExitDetails>,
    /// Exit rule for this lot.
    pub rule: RuleConfig,
}

impl PositionRecord {
    /// Create a pending lot whose order has been placed.
    #[must_use]
    pub fn pending(
        position_id: PositionId,
        group_id: GroupId,
        direction: PositionDirection,
        initial_stop: Decimal,
        rule: RuleConfig,
    ) -> Self {
        Self {
            position_id,
            group_id,
            direction,
            entry_price: None,
            peak_price: None,
            current_stop_loss: initial_stop,
            trailing_activated: false,
            protection_activated: false,
            status: PositionStatus::Pending,
            exit: None,
            rule,
        }
    }

    /// Create an active lot with a confirmed fill.
    #[must_use]
    pub fn filled(
        position_id: PositionId,
        group_id: GroupId,
        direction: PositionDirection,
        entry_price: Decimal,
        initial_stop: Decimal,
        rule: RuleConfig,
    ) -> Self {
        let mut record = Self::pending(position_id, group_id, direction, initial_stop, rule);
        record.confirm_fill(entry_price);
        record
    }

    /// Confirm the fill: PENDING -> ACTIVE with a known entry price.
    ///
    /// No-op unless the lot is PENDING; the entry price is set once.
    pub fn confirm_fill(&mut self, entry_price: Decimal) {
        if self.status != PositionStatus::Pending {
            return;
        }
        self.entry_price = Some(entry_price);
        self.peak_price = Some(entry_price);
        self.status = PositionStatus::Active;
    }

    /// 1-based lot ID from the rule.
    #[must_use]
    pub const fn lot_id(&self) -> u32 {
        self.rule.lot_id()
    }

    /// Whether the lot is ACTIVE.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// Whether the lot is EXITED.
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.status == PositionStatus::Exited
    }

    /// Realized P&L, if exited.
    #[must_use]
    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.exit.as_ref().map(|e| e.realized_pnl)
    }

    /// Peak price, falling back to the entry price.
    #[must_use]
    pub fn peak_or_entry(&self) -> Option<Decimal> {
        self.peak_price.or(self.entry_price)
    }

    /// Check that the lot can be evaluated and return its entry price.
    ///
    /// # Errors
    ///
    /// Returns `DataInconsistency` for records the evaluator must skip.
    pub fn evaluable_entry(&self) -> Result<Decimal, DataInconsistency> {
        if self.status != PositionStatus::Active {
            return Err(DataInconsistency::NotActive {
                position_id: self.position_id.clone(),
            });
        }
        if self.exit.is_some() {
            return Err(DataInconsistency::ExitedLotReactivated {
                position_id: self.position_id.clone(),
            });
        }
        self.entry_price
            .ok_or_else(|| DataInconsistency::MissingEntryPrice {
                position_id: self.position_id.clone(),
            })
    }

    /// Transition to EXITED and record the exit fields.
    ///
    /// Returns the recorded details, or `None` if the lot was not ACTIVE
    /// (a lot exits at most once).
    pub fn mark_exited(
        &mut self,
        reason: ExitReason,
        price: Decimal,
        time: SessionTime,
    ) -> Option<ExitDetails> {
        if self.status != PositionStatus::Active || self.exit.is_some() {
            return None;
        }
        let entry = self.entry_price?;
        let details = ExitDetails {
            reason,
            price,
            time,
            realized_pnl: self.direction.signed_pnl(entry, price),
        };
        self.status = PositionStatus::Exited;
        self.exit = Some(details.clone());
        Some(details)
    }
}
