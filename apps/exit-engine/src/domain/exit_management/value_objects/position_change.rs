//! Position Change Set
//!
//! State changes produced during one evaluation pass, written to the store
//! in a single batch per group.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ExitDetails;
use crate::domain::shared::PositionId;

/// One field-level write keyed by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionChange {
    /// New peak price.
    PeakUpdated {
        /// Position ID.
        position_id: PositionId,
        /// New peak.
        peak_price: Decimal,
    },
    /// Trailing stop armed.
    TrailingActivated {
        /// Position ID.
        position_id: PositionId,
    },
    /// Protective stop tightened by the cascade.
    ProtectionApplied {
        /// Position ID.
        position_id: PositionId,
        /// New stop level.
        current_stop_loss: Decimal,
    },
    /// Lot closed.
    Exited {
        /// Position ID.
        position_id: PositionId,
        /// Exit fields.
        details: ExitDetails,
    },
}

impl PositionChange {
    /// Position this change applies to.
    #[must_use]
    pub const fn position_id(&self) -> &PositionId {
        match self {
            Self::PeakUpdated { position_id, .. }
            | Self::TrailingActivated { position_id }
            | Self::ProtectionApplied { position_id, .. }
            | Self::Exited { position_id, .. } => position_id,
        }
    }

    /// Whether this write only holds once the exit it stems from is delivered.
    ///
    /// Exits and the protective stops they fund.
    #[must_use]
    pub const fn follows_exit(&self) -> bool {
        matches!(self, Self::Exited { .. } | Self::ProtectionApplied { .. })
    }

    /// Change type name.
    #[must_use]
    pub const fn change_type(&self) -> &'static str {
        match self {
            Self::PeakUpdated { .. } => "PEAK_UPDATED",
            Self::TrailingActivated { .. } => "TRAILING_ACTIVATED",
            Self::ProtectionApplied { .. } => "PROTECTION_APPLIED",
            Self::Exited { .. } => "EXITED",
        }
    }
}
