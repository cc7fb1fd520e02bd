//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod process_tick;

pub use process_tick::{ProcessTickUseCase, TickReport};
