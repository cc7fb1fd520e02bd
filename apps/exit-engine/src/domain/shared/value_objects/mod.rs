//! Shared value objects.

mod identifiers;
mod session_time;

pub use identifiers::{GroupId, PositionId};
pub use session_time::{SessionTime, SessionTimeError};
