//! Evaluation Diagnostics
//!
//! Non-fatal outcomes surfaced to the caller alongside exit actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::exit_management::errors::DataInconsistency;
use crate::domain::shared::GroupId;

/// Why the protective cascade did not update the next lot.
///
/// An expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CascadeSkip {
    /// No lot with `lot_id + 1` in the group.
    NoNextLot,
    /// The next lot already exited.
    NextLotExited,
    /// The next lot has no protective multiplier.
    NoMultiplier,
    /// An earlier lot is still open.
    PriorLotOpen,
    /// An earlier lot is absent from the group's history.
    PriorLotMissing,
    /// An earlier lot exited at a loss or flat.
    PriorLotLoss,
    /// Cumulative realized profit is not positive.
    NoCumulativeProfit,
    /// The next lot has no entry price to anchor the stop.
    MissingEntryPrice,
}

impl CascadeSkip {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoNextLot => "NO_NEXT_LOT",
            Self::NextLotExited => "NEXT_LOT_EXITED",
            Self::NoMultiplier => "NO_MULTIPLIER",
            Self::PriorLotOpen => "PRIOR_LOT_OPEN",
            Self::PriorLotMissing => "PRIOR_LOT_MISSING",
            Self::PriorLotLoss => "PRIOR_LOT_LOSS",
            Self::NoCumulativeProfit => "NO_CUMULATIVE_PROFIT",
            Self::MissingEntryPrice => "MISSING_ENTRY_PRICE",
        }
    }
}

impl fmt::Display for CascadeSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the caller should know about this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A lot was excluded from this tick.
    LotSkipped {
        /// Group being evaluated.
        group_id: GroupId,
        /// What was wrong with the lot.
        inconsistency: DataInconsistency,
    },
    /// The cascade declined to update the lot after `exited_lot_id`.
    CascadeSkipped {
        /// Group being evaluated.
        group_id: GroupId,
        /// Lot whose exit triggered the cascade.
        exited_lot_id: u32,
        /// Why nothing was updated.
        skip: CascadeSkip,
    },
    /// A group could not be loaded, persisted or dispatched.
    GroupFailed {
        /// Affected group.
        group_id: GroupId,
        /// Error description.
        message: String,
    },
}

impl Diagnostic {
    /// Group the diagnostic refers to.
    #[must_use]
    pub const fn group_id(&self) -> &GroupId {
        match self {
            Self::LotSkipped { group_id, .. }
            | Self::CascadeSkipped { group_id, .. }
            | Self::GroupFailed { group_id, .. } => group_id,
        }
    }

    /// Whether the diagnostic warrants a warning.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        !matches!(self, Self::CascadeSkipped { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LotSkipped {
                group_id,
                inconsistency,
            } => write!(f, "[{group_id}] lot skipped: {inconsistency}"),
            Self::CascadeSkipped {
                group_id,
                exited_lot_id,
                skip,
            } => write!(
                f,
                "[{group_id}] cascade after lot {exited_lot_id} skipped: {skip}"
            ),
            Self::GroupFailed { group_id, message } => {
                write!(f, "[{group_id}] group failed: {message}")
            }
        }
    }
}
