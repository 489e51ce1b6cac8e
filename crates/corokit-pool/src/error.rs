//! Error types for the thread pool

use core::fmt;

pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Thread count outside `1..=MAX_POOL_THREADS`, or a bad config value
    InvalidArgument,

    /// Task queue is at capacity
    TooManyTasks,

    /// Task is queued, running or finished-but-not-joined
    TaskInPool,

    /// Task was never pushed, or its result was already taken
    TaskNotPushed,

    /// Pool still has queued or running tasks
    HasTasks,

    /// `join_timeout` deadline passed before the task finished
    Timeout,

    /// OS thread creation failed or the task function panicked
    Unexpected(&'static str),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidArgument => write!(f, "invalid argument"),
            PoolError::TooManyTasks => write!(f, "too many tasks queued"),
            PoolError::TaskInPool => write!(f, "task is still in the pool"),
            PoolError::TaskNotPushed => write!(f, "task was not pushed"),
            PoolError::HasTasks => write!(f, "pool has unfinished tasks"),
            PoolError::Timeout => write!(f, "timed out waiting for task"),
            PoolError::Unexpected(what) => write!(f, "unexpected error: {}", what),
        }
    }
}

impl std::error::Error for PoolError {}

/// A consuming call that failed, handing its receiver back
///
/// `Task::detach`, `Task::delete` and `ThreadPool::shutdown` take `self`;
/// on failure the value comes back here so the caller still owns it.
pub struct Rejected<T> {
    pub value: T,
    pub error: PoolError,
}

impl<T> Rejected<T> {
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn error(&self) -> &PoolError {
        &self.error
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<T> std::error::Error for Rejected<T> {}
