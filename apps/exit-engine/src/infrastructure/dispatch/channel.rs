//! Channel-backed exit dispatcher.
//!
//! Forwards each action over a tokio mpsc channel to an executor task.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::ports::{DispatchError, ExitDispatcherPort};
use crate::domain::exit_management::value_objects::ExitAction;

/// Dispatcher that sends actions to an mpsc receiver.
#[derive(Debug, Clone)]
pub struct ChannelExitDispatcher {
    tx: mpsc::Sender<ExitAction>,
}

impl ChannelExitDispatcher {
    /// Create a dispatcher and the receiver an executor should drain.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ExitAction>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Wrap an existing sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<ExitAction>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ExitDispatcherPort for ChannelExitDispatcher {
    async fn dispatch(&self, actions: &[ExitAction]) -> Result<(), DispatchError> {
        for action in actions {
            self.tx
                .send(action.clone())
                .await
                .map_err(|_| DispatchError::Closed)?;
        }
        Ok(())
    }
}
