//! Error types for the coroutine scheduler

use core::fmt;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// `spawn` called outside of a running scheduler
    NotInitialized,

    /// Live coroutine limit reached
    TooManyCoroutines,

    /// `run` exceeded the configured poll budget
    BudgetExhausted { polls: u64 },

    /// Ready queue drained while the root coroutine was still suspended
    Deadlock { blocked: usize },

    /// Rejected by `SchedulerConfig::validate`
    InvalidConfig(&'static str),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::NotInitialized => write!(f, "no scheduler running on this thread"),
            SchedError::TooManyCoroutines => write!(f, "coroutine limit reached"),
            SchedError::BudgetExhausted { polls } => {
                write!(f, "poll budget exhausted after {} polls", polls)
            }
            SchedError::Deadlock { blocked } => {
                write!(f, "deadlock: {} coroutines blocked with no pending wakeup", blocked)
            }
            SchedError::InvalidConfig(msg) => write!(f, "invalid scheduler config: {}", msg),
        }
    }
}

impl std::error::Error for SchedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SchedError::Deadlock { blocked: 2 }.to_string(),
            "deadlock: 2 coroutines blocked with no pending wakeup"
        );
        assert_eq!(
            SchedError::InvalidConfig("max_coroutines must be at least 1").to_string(),
            "invalid scheduler config: max_coroutines must be at least 1"
        );
    }
}
