//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Services**: Stateless exit logic operating on loaded groups
//! - **Errors**: Rule validation and data consistency failures
//!
//! # Bounded Contexts
//!
//! - [`exit_management`]: Per-lot exit rules, peak tracking and the protective cascade

pub mod exit_management;
pub mod shared;
