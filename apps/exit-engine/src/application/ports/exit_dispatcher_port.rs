//! Exit Dispatcher Port (Driven Port)
//!
//! Hands exit intents to whatever places the closing orders.

use async_trait::async_trait;

use crate::domain::exit_management::value_objects::ExitAction;

/// Dispatch error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The receiving side has gone away.
    #[error("exit dispatcher closed")]
    Closed,

    /// The executor refused the batch.
    #[error("exit dispatch rejected: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },
}

/// Port for delivering exit actions to an executor.
#[async_trait]
pub trait ExitDispatcherPort: Send + Sync {
    /// Deliver the actions of one tick, in emission order.
    async fn dispatch(&self, actions: &[ExitAction]) -> Result<(), DispatchError>;
}

/// Dispatcher that discards every action.
#[derive(Debug, Clone, Default)]
pub struct NoOpExitDispatcher;

#[async_trait]
impl ExitDispatcherPort for NoOpExitDispatcher {
    async fn dispatch(&self, _actions: &[ExitAction]) -> Result<(), DispatchError> {
        Ok(())
    }
}
