//! Pool configuration

use corokit_core::constants::{MAX_POOL_TASKS, MAX_POOL_THREADS};
use corokit_core::env::env_get;

pub const THREADS_VAR: &str = "COROKIT_POOL_THREADS";
pub const TASKS_VAR: &str = "COROKIT_POOL_TASKS";

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker threads the pool may create, `1..=MAX_POOL_THREADS`
    pub max_threads: usize,

    /// Queue capacity, `1..=MAX_POOL_TASKS`
    pub max_tasks: usize,

    /// Workers are named `{prefix}-{n}`
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_threads: MAX_POOL_THREADS,
            max_tasks: MAX_POOL_TASKS,
            thread_name_prefix: "corokit-pool".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_threads: env_get(THREADS_VAR, defaults.max_threads),
            max_tasks: env_get(TASKS_VAR, defaults.max_tasks),
            ..defaults
        }
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn max_tasks(mut self, n: usize) -> Self {
        self.max_tasks = n;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if !(1..=MAX_POOL_THREADS).contains(&self.max_threads) {
            return Err("max_threads out of range");
        }
        if !(1..=MAX_POOL_TASKS).contains(&self.max_tasks) {
            return Err("max_tasks out of range");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds() {
        assert!(PoolConfig::new().validate().is_ok());
        assert!(PoolConfig::new().max_threads(0).validate().is_err());
        assert!(PoolConfig::new().max_threads(MAX_POOL_THREADS + 1).validate().is_err());
        assert!(PoolConfig::new().max_tasks(0).validate().is_err());
        assert!(PoolConfig::new().max_tasks(MAX_POOL_TASKS + 1).validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var(THREADS_VAR, "3");
        std::env::set_var(TASKS_VAR, "64");
        let config = PoolConfig::from_env();
        std::env::remove_var(THREADS_VAR);
        std::env::remove_var(TASKS_VAR);

        assert_eq!(config.max_threads, 3);
        assert_eq!(config.max_tasks, 64);
        assert_eq!(config.thread_name_prefix, "corokit-pool");
    }
}
