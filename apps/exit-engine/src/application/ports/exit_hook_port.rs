//! Exit Hook Port
//!
//! Synchronous callbacks invoked once per exit action after the tick's
//! changes are persisted.

use crate::domain::exit_management::value_objects::ExitAction;

/// Callback run for every exit action.
pub trait ExitHook: Send + Sync {
    /// Called once per action, in emission order.
    fn on_exit(&self, action: &ExitAction);
}

impl<F> ExitHook for F
where
    F: Fn(&ExitAction) + Send + Sync,
{
    fn on_exit(&self, action: &ExitAction) {
        self(action);
    }
}

/// Hook that logs each exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExitHook;

impl ExitHook for LoggingExitHook {
    fn on_exit(&self, action: &ExitAction) {
        tracing::info!(
            position_id = %action.position_id,
            group_id = %action.group_id,
            lot_id = action.lot_id,
            reason = %action.exit_reason,
            price = %action.exit_price,
            pnl = %action.realized_pnl,
            "Lot exit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit_management::value_objects::{ExitReason, PositionDirection};
    use crate::domain::shared::{GroupId, PositionId, SessionTime};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    fn action() -> ExitAction {
        ExitAction {
            position_id: PositionId::new("p1"),
            group_id: GroupId::new("g1"),
            lot_id: 1,
            direction: PositionDirection::Long,
            exit_price: dec!(22032),
            exit_time: SessionTime::parse("10:00:00").unwrap(),
            exit_reason: ExitReason::TrailingStop,
            realized_pnl: dec!(32),
        }
    }

    #[test]
    fn closure_is_a_hook() {
        let seen = Mutex::new(Vec::new());
        let hook = |a: &ExitAction| seen.lock().unwrap().push(a.lot_id);
        hook.on_exit(&action());
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn logging_hook_does_not_panic() {
        LoggingExitHook.on_exit(&action());
    }
}
