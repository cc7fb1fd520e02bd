//! Exit Management Errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::shared::{GroupId, PositionId};

/// Errors raised while constructing a per-lot rule configuration.
///
/// These are fatal at load time: a group with an invalid rule must not be
/// evaluated until the rule is corrected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleConfigError {
    /// Lot IDs are 1-based.
    #[error("Invalid lot id {lot_id}: lot ids start at 1")]
    InvalidLotId {
        /// The rejected lot ID.
        lot_id: u32,
    },

    /// Trailing stop enabled without one of its parameters.
    #[error("Lot {lot_id}: trailing stop enabled but '{field}' is missing")]
    MissingTrailingField {
        /// Lot ID.
        lot_id: u32,
        /// Name of the missing field.
        field: &'static str,
    },

    /// Trailing activation distance must be positive.
    #[error("Lot {lot_id}: trailing_activation must be positive, got {value}")]
    InvalidTrailingActivation {
        /// Lot ID.
        lot_id: u32,
        /// Rejected value.
        value: Decimal,
    },

    /// Trailing pullback ratio must be within [0, 1].
    #[error("Lot {lot_id}: trailing_pullback must be within [0, 1], got {value}")]
    InvalidTrailingPullback {
        /// Lot ID.
        lot_id: u32,
        /// Rejected value.
        value: Decimal,
    },

    /// Protective stop enabled without a multiplier.
    #[error("Lot {lot_id}: protective stop enabled but 'protective_stop_multiplier' is missing")]
    MissingProtectiveMultiplier {
        /// Lot ID.
        lot_id: u32,
    },

    /// Protective multiplier must be non-negative.
    #[error("Lot {lot_id}: protective_stop_multiplier must be non-negative, got {value}")]
    InvalidProtectiveMultiplier {
        /// Lot ID.
        lot_id: u32,
        /// Rejected value.
        value: Decimal,
    },
}

impl RuleConfigError {
    /// Lot the error refers to.
    #[must_use]
    pub const fn lot_id(&self) -> u32 {
        match self {
            Self::InvalidLotId { lot_id }
            | Self::MissingTrailingField { lot_id, .. }
            | Self::InvalidTrailingActivation { lot_id, .. }
            | Self::InvalidTrailingPullback { lot_id, .. }
            | Self::MissingProtectiveMultiplier { lot_id }
            | Self::InvalidProtectiveMultiplier { lot_id, .. } => *lot_id,
        }
    }
}

/// A position record that violates an invariant the evaluator relies on.
///
/// Recovered locally: the lot is skipped for the current tick and retried on
/// the next one. It is never force-closed because of this.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataInconsistency {
    /// Lot is ACTIVE but has no confirmed entry price.
    #[error("Position {position_id} is active without an entry price")]
    MissingEntryPrice {
        /// Offending position.
        position_id: PositionId,
    },

    /// Lot carries exit fields but is reported ACTIVE again.
    #[error("Position {position_id} already exited but reappeared as active")]
    ExitedLotReactivated {
        /// Offending position.
        position_id: PositionId,
    },

    /// Lot handed to the engine is not ACTIVE.
    #[error("Position {position_id} is not active")]
    NotActive {
        /// Offending position.
        position_id: PositionId,
    },

    /// Lot belongs to a different group than the one being evaluated.
    #[error("Position {position_id} belongs to group {actual}, expected {expected}")]
    GroupMismatch {
        /// Offending position.
        position_id: PositionId,
        /// Group being evaluated.
        expected: GroupId,
        /// Group recorded on the position.
        actual: GroupId,
    },

    /// Two lots in one group share a lot ID.
    #[error("Position {position_id} duplicates lot id {lot_id} in group {group_id}")]
    DuplicateLotId {
        /// Offending position.
        position_id: PositionId,
        /// Group ID.
        group_id: GroupId,
        /// Duplicated lot ID.
        lot_id: u32,
    },

    /// Group metadata could not be found for an active lot.
    #[error("Group {group_id} not found for position {position_id}")]
    GroupNotFound {
        /// Offending position.
        position_id: PositionId,
        /// Missing group.
        group_id: GroupId,
    },
}

impl DataInconsistency {
    /// Position the inconsistency refers to.
    #[must_use]
    pub const fn position_id(&self) -> &PositionId {
        match self {
            Self::MissingEntryPrice { position_id }
            | Self::ExitedLotReactivated { position_id }
            | Self::NotActive { position_id }
            | Self::GroupMismatch { position_id, .. }
            | Self::DuplicateLotId { position_id, .. }
            | Self::GroupNotFound { position_id, .. } => position_id,
        }
    }
}
