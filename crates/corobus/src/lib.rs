//! # corobus
//!
//! Message bus for cooperative coroutines.
//!
//! A `Bus` owns a set of bounded channels of `u32`. Coroutines running on
//! a `corokit_runtime::Scheduler` block in `send` while a channel is full
//! and in `recv` while it is empty; blocked coroutines are resumed in the
//! order they started waiting. `close` resumes every waiter with
//! `BusError::NoChannel`.
//!
//! ## Modules
//!
//! - `wakeup` - FIFO queue of parked coroutines
//! - `channel` - bounded channel with send and receive queues
//! - `bus` - handle table, blocking and non-blocking operations
//! - `error` - Error types

pub mod bus;
pub mod channel;
pub mod error;
pub mod wakeup;

pub use bus::{Bus, Handle};
pub use error::{BusError, BusResult};
pub use wakeup::WakeupQueue;
