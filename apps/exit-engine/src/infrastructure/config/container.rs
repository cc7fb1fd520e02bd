//! Dependency Injection Container
//!
//! Wires the loaded configuration and the chosen adapters into the tick
//! pipeline.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExitDispatcherPort, ExitHook, PositionRepositoryPort};
use crate::application::services::{IntervalThrottle, TickDriver, TickDriverConfig};
use crate::application::use_cases::ProcessTickUseCase;
use crate::config::{Config, ConfigError};
use crate::domain::exit_management::services::ExitConditionEvaluator;
use crate::domain::exit_management::value_objects::RuleConfig;

/// Dependency injection container.
///
/// Holds the validated configuration and the adapters. Use cases are built
/// on demand and share the same repository and dispatcher.
pub struct Container<R, D>
where
    R: PositionRepositoryPort + 'static,
    D: ExitDispatcherPort + 'static,
{
    config: Config,
    repository: Arc<R>,
    dispatcher: Arc<D>,
    hooks: Vec<Arc<dyn ExitHook>>,
}

impl<R, D> Container<R, D>
where
    R: PositionRepositoryPort + 'static,
    D: ExitDispatcherPort + 'static,
{
    /// Create a new container with all dependencies.
    pub fn new(config: Config, repository: Arc<R>, dispatcher: Arc<D>) -> Self {
        Self {
            config,
            repository,
            dispatcher,
            hooks: Vec::new(),
        }
    }

    /// Register an exit hook for every use case built afterwards.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn ExitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Loaded configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Get the position repository.
    pub fn repository(&self) -> Arc<R> {
        Arc::clone(&self.repository)
    }

    /// Get the exit dispatcher.
    pub fn dispatcher(&self) -> Arc<D> {
        Arc::clone(&self.dispatcher)
    }

    /// Validated per-lot rules.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRule` if a rule fails validation.
    pub fn rules(&self) -> Result<Vec<RuleConfig>, ConfigError> {
        self.config.rule_configs()
    }

    /// Create a `ProcessTickUseCase` from the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the end-of-day close time is malformed.
    pub fn process_tick_use_case(&self) -> Result<ProcessTickUseCase<R, D>, ConfigError> {
        let evaluator = ExitConditionEvaluator::new(self.config.evaluator_config()?);
        let mut use_case = ProcessTickUseCase::new(
            Arc::clone(&self.repository),
            Arc::clone(&self.dispatcher),
            evaluator,
        );

        let interval_ms = self.config.engine.peak_update_interval_ms;
        if interval_ms > 0 {
            use_case = use_case.with_peak_throttle(IntervalThrottle::from_millis(interval_ms));
        }
        for hook in &self.hooks {
            use_case.add_hook(Arc::clone(hook));
        }
        Ok(use_case)
    }

    /// Spawn a `TickDriver` on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the use case cannot be built.
    pub fn spawn_tick_driver(&self, shutdown: CancellationToken) -> Result<TickDriver, ConfigError> {
        let use_case = Arc::new(self.process_tick_use_case()?);
        let driver_config = TickDriverConfig::from(&self.config.engine);
        Ok(TickDriver::spawn(use_case, driver_config, shutdown))
    }
}
