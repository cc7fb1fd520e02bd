//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driven Ports** (Secondary/Outbound): position storage, exit dispatch
//! - **Callbacks**: exit hooks run after delivery

mod exit_dispatcher_port;
mod exit_hook_port;
mod position_repository_port;

pub use exit_dispatcher_port::{DispatchError, ExitDispatcherPort, NoOpExitDispatcher};
pub use exit_hook_port::{ExitHook, LoggingExitHook};
pub use position_repository_port::{PositionRepositoryPort, RepositoryError};
