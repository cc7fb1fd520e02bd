//! Application Services
//!
//! Application services coordinate domain logic and infrastructure adapters.
//! They differ from use cases in that they typically run as background tasks
//! or provide long-running functionality.

mod throttle;
mod tick_driver;

pub use throttle::IntervalThrottle;
pub use tick_driver::{TickDriver, TickDriverConfig, TickDriverError};
