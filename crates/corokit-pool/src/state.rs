//! Task lifecycle
//!
//! ```text
//!   New ──push──▶ Pushed ──pickup──▶ Running ──complete──▶ Finished ──join──▶ Joined
//!    ▲                │                  │                    │               │
//!    │                └──────detach──────┴───────detach───────┘               │
//!    │                                   ▼                                    │
//!    │                               Detached                                 │
//!    └────────────────────────────────push────────────────────────────────────┘
//! ```
//!
//! Every state change goes through `transition`, called with the task's
//! lock held. The returned `Reclaim` says who drops the task's result:
//! whoever the table names, and nobody else.

use crate::error::{PoolError, PoolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Pushed,
    Running,
    Finished,
    Joined,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// Caller queues the task
    Push,
    /// Worker dequeues it
    Pickup,
    /// Worker's call to the task function returned
    Complete,
    /// Caller asks for the result
    Join,
    /// Caller gives up on the result
    Detach,
    /// Caller destroys an idle task
    Delete,
}

/// Party responsible for dropping the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    None,
    /// The caller, right now
    Caller,
    /// The worker, when the function returns
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Move(TaskState, Reclaim),
    /// Event is valid but must wait for the worker (join on a live task)
    Wait,
}

pub fn transition(state: TaskState, event: TaskEvent) -> PoolResult<Outcome> {
    use Outcome::{Move, Wait};
    use TaskEvent::*;
    use TaskState::*;

    match (state, event) {
        (New | Joined, Push) => Ok(Move(Pushed, Reclaim::None)),
        (_, Push) => Err(PoolError::TaskInPool),

        (Pushed, Pickup) => Ok(Move(Running, Reclaim::None)),
        // Detached while queued: the function still runs.
        (Detached, Pickup) => Ok(Move(Detached, Reclaim::None)),
        (_, Pickup) => Err(PoolError::Unexpected("pickup of a task that was not queued")),

        (Running, Complete) => Ok(Move(Finished, Reclaim::None)),
        (Detached, Complete) => Ok(Move(Detached, Reclaim::Worker)),
        (_, Complete) => Err(PoolError::Unexpected("completion of a task that was not running")),

        (Pushed | Running, Join) => Ok(Wait),
        (Finished, Join) => Ok(Move(Joined, Reclaim::None)),
        (New | Joined | Detached, Join) => Err(PoolError::TaskNotPushed),

        (Pushed | Running, Detach) => Ok(Move(Detached, Reclaim::Worker)),
        (Finished, Detach) => Ok(Move(Detached, Reclaim::Caller)),
        (Detached, Detach) => Ok(Move(Detached, Reclaim::None)),
        (New | Joined, Detach) => Err(PoolError::TaskNotPushed),

        (New | Joined, Delete) => Ok(Move(state, Reclaim::Caller)),
        (Detached, Delete) => Ok(Move(Detached, Reclaim::None)),
        (Pushed | Running | Finished, Delete) => Err(PoolError::TaskInPool),
    }
}
