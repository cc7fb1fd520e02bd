//! Infrastructure configuration: dependency wiring.

mod container;

pub use container::Container;
