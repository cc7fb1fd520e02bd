//! Shared Domain Types
//!
//! Value objects shared across the engine.

pub mod value_objects;

pub use value_objects::{GroupId, PositionId, SessionTime, SessionTimeError};
