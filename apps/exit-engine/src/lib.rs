// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Exit Engine - Rust Core Library
//!
//! Per-lot exit engine for multi-lot intraday futures trade groups. A group
//! is entered as N lots on one breakout signal; every lot carries its own
//! trailing and protective rules while the whole group shares the opening
//! range stop and the end-of-day close.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core exit logic
//!   - `exit_management`: lot records, rules, the exit evaluator, peak
//!     tracking and the protective stop cascade
//!   - `shared`: identifiers and session time
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: `PositionRepositoryPort`, `ExitDispatcherPort`, `ExitHook`
//!   - `use_cases`: `ProcessTick`
//!   - `services`: `TickDriver` worker, `IntervalThrottle`
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `persistence`: in-memory lot store
//!   - `dispatch`: channel and dry-run logging dispatchers
//!   - `config`: Dependency injection container
//!
//! # Exit priority
//!
//! Per group and tick: end-of-day close, then the initial range stop (both
//! close every active lot at the tick price), then each lot in ascending
//! lot ID: protective stop, trailing activation, trailing trigger, peak update.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration loading and validation.
pub mod config;

/// Structured error codes.
pub mod error;

/// Prometheus metrics.
pub mod observability;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports from Clean Architecture
// =============================================================================

// Domain re-exports
pub use domain::exit_management::{
    CascadeSkip, DataInconsistency, Diagnostic, EffectiveStop, EvaluationOptions,
    EvaluatorConfig, ExitAction, ExitConditionEvaluator, ExitReason, GroupEvaluation, GroupRange,
    GroupSummary, PeakTracker, PositionChange, PositionDirection, PositionRecord, PositionStatus,
    PriceTick, ProtectiveStopCascade, RuleConfig, RuleConfigError, RuleConfigSpec, StopUpdate,
    TradeGroup,
};
pub use domain::shared::{GroupId, PositionId, SessionTime};

// Application re-exports
pub use application::ports::{
    DispatchError, ExitDispatcherPort, ExitHook, LoggingExitHook, PositionRepositoryPort,
    RepositoryError,
};
pub use application::services::{IntervalThrottle, TickDriver, TickDriverConfig};
pub use application::use_cases::{ProcessTickUseCase, TickReport};

// Infrastructure re-exports
pub use infrastructure::config::Container;
pub use infrastructure::dispatch::{ChannelExitDispatcher, LoggingExitDispatcher};
pub use infrastructure::persistence::InMemoryPositionRepository;

// Cross-cutting re-exports
pub use config::{Config, ConfigError, load_config, load_config_from_string};
pub use error::{EngineError, ErrorCode};
