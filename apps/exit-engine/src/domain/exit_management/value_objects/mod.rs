//! Exit Management Value Objects

mod diagnostic;
mod direction;
mod exit_action;
mod exit_reason;
mod position_change;
mod position_record;
mod price_tick;
mod rule_config;
mod trade_group;
mod updates;

pub use diagnostic::{CascadeSkip, Diagnostic};
pub use direction::PositionDirection;
pub use exit_action::ExitAction;
pub use exit_reason::ExitReason;
pub use position_change::PositionChange;
pub use position_record::{ExitDetails, PositionRecord, PositionStatus};
pub use price_tick::PriceTick;
pub use rule_config::{RuleConfig, RuleConfigSpec, TrailingRule};
pub use trade_group::{GroupRange, GroupSummary, TradeGroup};
pub use updates::{PeakUpdate, StopUpdate};
