//! Configuration module for the exit engine.
//!
//! Loads the YAML configuration with environment variable interpolation,
//! validates it and converts it into the domain's rule and evaluator types.
//!
//! # Usage
//!
//! ```rust,ignore
//! use exit_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Validated per-lot rules, ordered by lot ID
//! let rules = config.rule_configs()?;
//! ```

mod engine;
mod observability;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::exit_management::errors::RuleConfigError;
use crate::domain::exit_management::services::EvaluatorConfig;
use crate::domain::exit_management::value_objects::{RuleConfig, RuleConfigSpec};

pub use engine::{EngineConfig, EodCloseConfig, TickQueuePolicy};
pub use observability::{LogFormat, LoggingConfig, MetricsSettings, ObservabilityConfig};

/// Upper bound on `peak_update_interval_ms`.
pub const MAX_PEAK_UPDATE_INTERVAL_MS: u64 = 60_000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// A lot rule is invalid.
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleConfigError),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Per-lot exit rules.
    #[serde(default)]
    pub rules: Vec<RuleConfigSpec>,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Validated rules sorted by lot ID.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRule` for the first rule that fails validation.
    pub fn rule_configs(&self) -> Result<Vec<RuleConfig>, ConfigError> {
        let mut rules = self
            .rules
            .iter()
            .cloned()
            .map(RuleConfig::new)
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by_key(RuleConfig::lot_id);
        Ok(rules)
    }

    /// Rule for one lot.
    #[must_use]
    pub fn rule_for_lot(&self, lot_id: u32) -> Option<RuleConfig> {
        self.rules
            .iter()
            .find(|r| r.lot_id == lot_id)
            .cloned()
            .and_then(|spec| RuleConfig::new(spec).ok())
    }

    /// Evaluator configuration derived from the engine section.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the end-of-day close time is malformed.
    pub fn evaluator_config(&self) -> Result<EvaluatorConfig, ConfigError> {
        let eod_close_time = self
            .engine
            .eod_close
            .session_time()
            .map_err(|e| ConfigError::ValidationError(format!("eod_close.close_time: {e}")))?;
        Ok(EvaluatorConfig { eod_close_time })
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let rules = config.rule_configs()?;

    for (index, rule) in rules.iter().enumerate() {
        let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if rule.lot_id() != expected {
            return Err(ConfigError::ValidationError(format!(
                "rules must have unique lot_id values numbered from 1 without gaps; expected lot {expected}, found {}",
                rule.lot_id()
            )));
        }
    }

    config.evaluator_config()?;

    if config.engine.peak_update_interval_ms > MAX_PEAK_UPDATE_INTERVAL_MS {
        return Err(ConfigError::ValidationError(format!(
            "engine.peak_update_interval_ms must be at most {MAX_PEAK_UPDATE_INTERVAL_MS}"
        )));
    }

    if config.engine.tick_queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "engine.tick_queue_capacity must be positive".to_string(),
        ));
    }

    if config.observability.metrics.enabled && config.observability.metrics.socket_addr().is_err()
    {
        return Err(ConfigError::ValidationError(format!(
            "observability.metrics.listen_addr is not a socket address: {}",
            config.observability.metrics.listen_addr
        )));
    }

    Ok(())
}
