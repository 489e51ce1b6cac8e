//! Scheduler configuration

use corokit_core::constants::DEFAULT_MAX_COROUTINES;
use corokit_core::env::{env_get, env_get_bool, env_get_opt};

pub const MAX_COROUTINES_VAR: &str = "COROKIT_MAX_COROUTINES";
pub const POLL_BUDGET_VAR: &str = "COROKIT_POLL_BUDGET";
pub const DEBUG_LOGGING_VAR: &str = "COROKIT_SCHED_DEBUG";

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of live (unfinished) coroutines
    pub max_coroutines: usize,

    /// Upper bound on polls in one `run`; `None` means unbounded
    pub poll_budget: Option<u64>,

    /// Log every spawn and completion at debug level
    pub debug_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_coroutines: DEFAULT_MAX_COROUTINES,
            poll_budget: None,
            debug_logging: false,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `COROKIT_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_coroutines: env_get(MAX_COROUTINES_VAR, defaults.max_coroutines),
            poll_budget: env_get_opt(POLL_BUDGET_VAR).or(defaults.poll_budget),
            debug_logging: env_get_bool(DEBUG_LOGGING_VAR, defaults.debug_logging),
        }
    }

    pub fn max_coroutines(mut self, n: usize) -> Self {
        self.max_coroutines = n;
        self
    }

    pub fn poll_budget(mut self, polls: u64) -> Self {
        self.poll_budget = Some(polls);
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_coroutines == 0 {
            return Err("max_coroutines must be at least 1");
        }
        if self.poll_budget == Some(0) {
            return Err("poll_budget must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_validate() {
        let config = SchedulerConfig::new().max_coroutines(8).poll_budget(100);
        assert_eq!(config.max_coroutines, 8);
        assert_eq!(config.poll_budget, Some(100));
        assert!(config.validate().is_ok());

        assert!(SchedulerConfig::new().max_coroutines(0).validate().is_err());
        assert!(SchedulerConfig::new().poll_budget(0).validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var(MAX_COROUTINES_VAR, "12");
        std::env::set_var(POLL_BUDGET_VAR, "3000");
        let config = SchedulerConfig::from_env();
        std::env::remove_var(MAX_COROUTINES_VAR);
        std::env::remove_var(POLL_BUDGET_VAR);

        assert_eq!(config.max_coroutines, 12);
        assert_eq!(config.poll_budget, Some(3000));
    }
}
