//! # corokit
//!
//! Concurrency building blocks behind one crate:
//!
//! - **Bus**: bounded `u32` channels for cooperative coroutines on a
//!   single-threaded scheduler, with FIFO wakeups
//! - **Pool**: a bounded set of OS worker threads running joinable or
//!   detachable tasks
//! - **Chat**: a newline-framed client and server over edge-triggered epoll
//!
//! ## Quick Start
//!
//! ```ignore
//! use corokit::{block_on, spawn, Bus, SchedulerConfig};
//! use std::rc::Rc;
//!
//! let sum = block_on(SchedulerConfig::default(), async {
//!     let bus = Rc::new(Bus::new());
//!     let h = bus.open(2).unwrap();
//!
//!     let tx = bus.clone();
//!     spawn(async move {
//!         for v in 1..=10 {
//!             tx.send(h, v).await.unwrap();
//!         }
//!     })
//!     .unwrap();
//!
//!     let mut sum = 0;
//!     for _ in 0..10 {
//!         sum += bus.recv(h).await.unwrap();
//!     }
//!     sum
//! })
//! .unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │   corobus    │   │ corokit-pool │   │     corokit-chat     │
//! │ Bus, Channel │   │ ThreadPool,  │   │ ChatClient/Server,   │
//! │ WakeupQueue  │   │ Task         │   │ Poller, epoll        │
//! └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘
//!        ▼                  │                      │
//! ┌──────────────┐          │                      │
//! │   runtime    │          │                      │
//! │  Scheduler   │          │                      │
//! └──────┬───────┘          │                      │
//!        └──────────────────┼──────────────────────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │    corokit-core     │
//!                │ ids, kprint, env    │
//!                └─────────────────────┘
//! ```

pub use corokit_core::{constants, env, kprint, CoroId, CoroState};
pub use corokit_core::{kdebug, kerror, kinfo, kprintln, ktrace, kwarn};

pub use corokit_runtime::{
    block_on, current_id, is_in_coro, spawn, suspend_until, yield_now, RunReport, SchedError,
    SchedResult, Scheduler, SchedulerConfig,
};

pub use corobus::{Bus, BusError, BusResult, Handle, WakeupQueue};

pub use corokit_pool::{PoolConfig, PoolError, PoolResult, Rejected, Task, TaskState, ThreadPool};

pub use corokit_chat::{
    ChatClient, ChatConfig, ChatError, ChatMessage, ChatResult, ChatServer, ClientState,
    GrowableBuffer, Interest,
};

/// Lower-level chat pieces: framing, pollers, registrations
pub mod chat {
    pub use corokit_chat::{buffer, epoll, frame, poller, EpollPoller, Event, Poller, Registration};
}

pub mod prelude {
    pub use crate::{
        block_on, spawn, yield_now, Bus, ChatClient, ChatServer, SchedulerConfig, Task, ThreadPool,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_bus_over_facade() {
        let sum = block_on(SchedulerConfig::default(), async {
            let bus = Rc::new(Bus::new());
            let h = bus.open(2).unwrap();
            let tx = bus.clone();
            spawn(async move {
                for v in 1..=10 {
                    tx.send(h, v).await.unwrap();
                }
            })
            .unwrap();

            let mut sum = 0;
            for _ in 0..10 {
                sum += bus.recv(h).await.unwrap();
            }
            sum
        })
        .unwrap();
        assert_eq!(sum, 55);
    }

    #[test]
    fn test_pool_over_facade() {
        let pool = ThreadPool::new(2).unwrap();
        let task = Task::new(|| "done");
        pool.push(&task).unwrap();
        assert_eq!(task.join(), Ok("done"));
        pool.shutdown().unwrap();
    }
}
