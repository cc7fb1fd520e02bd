//! Infrastructure Layer
//!
//! This module contains all adapters (implementations) for the ports defined
//! in the application layer. Following hexagonal architecture:
//!
//! - **Driven Adapters (Outbound)**: Implement ports for external systems
//!   - `persistence/`: Lot storage (in-memory)
//!   - `dispatch/`: Exit intent delivery (channel, dry-run logging)
//!
//! - **Wiring**
//!   - `config/`: Dependency injection container

pub mod config;
pub mod dispatch;
pub mod persistence;
