//! Exit dispatch adapters.

mod channel;
mod logging;

pub use channel::ChannelExitDispatcher;
pub use logging::LoggingExitDispatcher;
