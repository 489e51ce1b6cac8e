//! # corokit-pool
//!
//! Bounded pool of OS worker threads running `Task`s.
//!
//! Workers are created lazily on `push`, never more than the configured
//! maximum, and run tasks in FIFO order. Each task is joined for its
//! result, or detached so the pool drops the result when it is done.
//!
//! ## Modules
//!
//! - `config` - Pool limits and worker naming
//! - `pool` - `ThreadPool` and the worker loop
//! - `task` - `Task` handle
//! - `state` - Task lifecycle table
//! - `error` - Error types

pub mod config;
pub mod error;
pub mod pool;
pub mod state;
pub mod task;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult, Rejected};
pub use pool::ThreadPool;
pub use state::TaskState;
pub use task::Task;
