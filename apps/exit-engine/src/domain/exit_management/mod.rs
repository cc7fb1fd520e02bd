//! Exit Management Bounded Context
//!
//! Multi-lot exit decisions for futures trade groups. A group is opened as
//! N lots that share an entry range; each lot carries its own exit rule.
//! The evaluator walks the group on every price tick and decides which lots
//! close and why, and the protective cascade locks in profit from exited
//! lots onto the next open lot.

pub mod errors;
pub mod services;
pub mod value_objects;

pub use errors::{DataInconsistency, RuleConfigError};
pub use services::{
    EffectiveStop, EvaluationOptions, EvaluatorConfig, ExitConditionEvaluator, GroupEvaluation,
    PeakTracker, ProtectiveStopCascade,
};
pub use value_objects::{
    CascadeSkip, Diagnostic, ExitAction, ExitDetails, ExitReason, GroupRange, GroupSummary,
    PeakUpdate, PositionChange, PositionDirection, PositionRecord, PositionStatus, PriceTick,
    RuleConfig, RuleConfigSpec, StopUpdate, TradeGroup, TrailingRule,
};
