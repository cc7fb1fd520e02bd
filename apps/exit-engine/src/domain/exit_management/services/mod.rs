//! Exit Management Domain Services

mod exit_evaluator;
mod peak_tracker;
mod protective_cascade;

pub use exit_evaluator::{
    EffectiveStop, EvaluationOptions, EvaluatorConfig, ExitConditionEvaluator, GroupEvaluation,
};
pub use peak_tracker::PeakTracker;
pub use protective_cascade::ProtectiveStopCascade;
