//! Structured error handling for the exit engine.
//!
//! Every failure surfaced outside a bounded context is converted into an
//! [`EngineError`] carrying a stable [`ErrorCode`] plus key-value context,
//! so callers can log and route it without matching on inner types.
//!
//! # Codes
//!
//! | Reason | Retryable | Usage |
//! |--------|-----------|-------|
//! | `INVALID_RULE` | no | Lot rule failed validation |
//! | `INVALID_CONFIG` | no | Config file unreadable or invalid |
//! | `INVALID_TICK` | no | Malformed tick time |
//! | `DATA_INCONSISTENCY` | no | Stored lot violates a state invariant |
//! | `POSITION_NOT_FOUND` | no | Write targeted an unknown lot |
//! | `REPOSITORY_UNAVAILABLE` | yes | Store could not be reached |
//! | `DISPATCH_FAILED` | yes | Exit intents could not be delivered |
//! | `INTERNAL_ERROR` | no | Unexpected failure |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{DispatchError, RepositoryError};
use crate::config::ConfigError;
use crate::domain::exit_management::errors::{DataInconsistency, RuleConfigError};
use crate::domain::shared::SessionTimeError;

/// Error codes for the exit engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    /// Lot rule failed validation.
    InvalidRule,
    /// Configuration unreadable or invalid.
    InvalidConfig,
    /// Malformed tick.
    InvalidTick,

    // Data errors
    /// Stored lot violates a state invariant.
    DataInconsistency,
    /// Write targeted an unknown lot.
    PositionNotFound,

    // Infrastructure errors
    /// Store could not be reached or rejected a write.
    RepositoryUnavailable,
    /// Exit intents could not be delivered.
    DispatchFailed,

    // Internal errors
    /// Unexpected failure.
    InternalError,
}

impl ErrorCode {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RepositoryUnavailable | Self::DispatchFailed)
    }

    /// Stable reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRule => "INVALID_RULE",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::InvalidTick => "INVALID_TICK",
            Self::DataInconsistency => "DATA_INCONSISTENCY",
            Self::PositionNotFound => "POSITION_NOT_FOUND",
            Self::RepositoryUnavailable => "REPOSITORY_UNAVAILABLE",
            Self::DispatchFailed => "DISPATCH_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A rich error with context for the exit engine.
#[derive(Debug, Error)]
pub struct EngineError {
    /// Error code.
    code: ErrorCode,
    /// Human-readable message.
    message: String,
    /// Additional context (key-value pairs).
    context: Vec<(String, String)>,
}

impl EngineError {
    /// Create a new engine error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Look up one context value.
    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

impl From<RuleConfigError> for EngineError {
    fn from(err: RuleConfigError) -> Self {
        let lot_id = err.lot_id();
        Self::new(ErrorCode::InvalidRule, err.to_string()).with_context("lot_id", lot_id.to_string())
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidRule(rule) => Self::from(rule),
            other => Self::new(ErrorCode::InvalidConfig, other.to_string()),
        }
    }
}

impl From<SessionTimeError> for EngineError {
    fn from(err: SessionTimeError) -> Self {
        Self::new(ErrorCode::InvalidTick, err.to_string())
    }
}

impl From<DataInconsistency> for EngineError {
    fn from(err: DataInconsistency) -> Self {
        let position_id = err.position_id().to_string();
        Self::new(ErrorCode::DataInconsistency, err.to_string())
            .with_context("position_id", position_id)
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match &err {
            RepositoryError::PositionNotFound { position_id } => {
                let position_id = position_id.to_string();
                Self::new(ErrorCode::PositionNotFound, err.to_string())
                    .with_context("position_id", position_id)
            }
            RepositoryError::WriteRejected { position_id, .. } => {
                let position_id = position_id.to_string();
                Self::new(ErrorCode::RepositoryUnavailable, err.to_string())
                    .with_context("position_id", position_id)
            }
            RepositoryError::Unavailable { .. } => {
                Self::new(ErrorCode::RepositoryUnavailable, err.to_string())
            }
        }
    }
}

impl From<DispatchError> for EngineError {
    fn from(err: DispatchError) -> Self {
        Self::new(ErrorCode::DispatchFailed, err.to_string())
    }
}
