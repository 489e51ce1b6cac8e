//! # corokit-runtime
//!
//! Cooperative coroutine scheduler for corokit.
//!
//! One OS thread, no preemption. A coroutine is a `Future<Output = ()>`
//! that runs until it awaits a suspension point (`yield_now`,
//! `suspend_until`) and is resumed only by an explicit wake. Resumption
//! order is the order in which wakes arrive.
//!
//! This crate provides:
//! - `Scheduler` - FIFO ready queue and coroutine table
//! - `spawn`, `current_id` - operations valid from inside a coroutine
//! - `yield_now`, `suspend_until` - the parking primitives
//! - `block_on` - run a root coroutine to completion

pub mod config;
pub mod error;
pub mod park;
pub mod scheduler;
pub mod tls;
mod waker;

// Re-exports
pub use config::SchedulerConfig;
pub use error::{SchedError, SchedResult};
pub use park::{suspend_until, yield_now};
pub use scheduler::{block_on, spawn, RunReport, Scheduler};
pub use tls::{current_id, is_in_coro};
