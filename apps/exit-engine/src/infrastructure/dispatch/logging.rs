//! Exit dispatcher that only logs.

use async_trait::async_trait;

use crate::application::ports::{DispatchError, ExitDispatcherPort};
use crate::domain::exit_management::value_objects::ExitAction;

/// Dispatcher that writes every action to the log and succeeds.
///
/// Useful for dry runs where no executor is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExitDispatcher;

#[async_trait]
impl ExitDispatcherPort for LoggingExitDispatcher {
    async fn dispatch(&self, actions: &[ExitAction]) -> Result<(), DispatchError> {
        for action in actions {
            tracing::info!(
                position_id = %action.position_id,
                group_id = %action.group_id,
                lot_id = action.lot_id,
                direction = %action.direction,
                reason = %action.exit_reason,
                price = %action.exit_price,
                time = %action.exit_time,
                "Exit dispatched (dry run)"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_dispatcher_succeeds() {
        assert!(LoggingExitDispatcher.dispatch(&[]).await.is_ok());
    }
}
