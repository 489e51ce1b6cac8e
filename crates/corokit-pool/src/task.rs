//! Joinable pool task
//!
//! A `Task` is a handle to shared state that the pool's queue also holds
//! while the task is in flight. The state field and the result sit behind
//! one mutex; the function sits behind its own so that running it never
//! blocks `join`, `is_running` or `detach`.
//!
//! Dropping a handle whose task is still in the pool detaches it.

use crate::error::{PoolError, PoolResult, Rejected};
use crate::state::{transition, Outcome, Reclaim, TaskEvent, TaskState};

use corokit_core::kerror;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

type TaskFn<T> = Box<dyn FnMut() -> T + Send>;

/// Lock without propagating poison. Task functions already run under
/// `catch_unwind`, so a poisoned lock only means a panic elsewhere
/// while the guard was held and the data is still consistent.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Status<T> {
    state: TaskState,
    result: Option<PoolResult<T>>,
}

pub(crate) struct TaskShared<T> {
    func: Mutex<TaskFn<T>>,
    status: Mutex<Status<T>>,
    finished: Condvar,
}

/// Work item as the pool queue sees it
pub(crate) trait Job: Send + Sync {
    /// Apply `Push` under the task lock
    fn mark_pushed(&self) -> PoolResult<()>;
    /// Undo `mark_pushed` when the queue rejected the job after all
    fn unmark_pushed(&self, previous: TaskState);
    fn state(&self) -> TaskState;
    /// Run on a worker thread: pickup, call, complete
    fn run(&self);
}

impl<T: Send + 'static> Job for TaskShared<T> {
    fn mark_pushed(&self) -> PoolResult<()> {
        let mut status = lock(&self.status);
        if let Outcome::Move(next, _) = transition(status.state, TaskEvent::Push)? {
            status.state = next;
            status.result = None;
        }
        Ok(())
    }

    fn unmark_pushed(&self, previous: TaskState) {
        lock(&self.status).state = previous;
    }

    fn state(&self) -> TaskState {
        lock(&self.status).state
    }

    fn run(&self) {
        {
            let mut status = lock(&self.status);
            match transition(status.state, TaskEvent::Pickup) {
                Ok(Outcome::Move(next, _)) => status.state = next,
                other => {
                    kerror!("pool: dropping task in state {:?}: {:?}", status.state, other);
                    return;
                }
            }
        }

        let output = {
            let mut func = lock(&self.func);
            panic::catch_unwind(AssertUnwindSafe(|| (*func)()))
                .map_err(|_| PoolError::Unexpected("task function panicked"))
        };

        let mut status = lock(&self.status);
        match transition(status.state, TaskEvent::Complete) {
            Ok(Outcome::Move(next, Reclaim::Worker)) => {
                status.state = next;
                drop(status);
                drop(output);
            }
            Ok(Outcome::Move(next, _)) => {
                status.state = next;
                status.result = Some(output);
                self.finished.notify_all();
            }
            other => {
                kerror!("pool: task completed in state {:?}: {:?}", status.state, other);
            }
        }
    }
}

/// Unit of work for a `ThreadPool`
///
/// The function is `FnMut` so that a joined task can be pushed again.
pub struct Task<T: Send + 'static> {
    pub(crate) shared: Arc<TaskShared<T>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn new<F>(func: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Task {
            shared: Arc::new(TaskShared {
                func: Mutex::new(Box::new(func)),
                status: Mutex::new(Status {
                    state: TaskState::New,
                    result: None,
                }),
                finished: Condvar::new(),
            }),
        }
    }

    pub(crate) fn job(&self) -> Arc<dyn Job> {
        Arc::clone(&self.shared) as Arc<dyn Job>
    }

    pub fn state(&self) -> TaskState {
        lock(&self.shared.status).state
    }

    /// The function has returned (whether or not its result was joined)
    pub fn is_finished(&self) -> bool {
        matches!(self.state(), TaskState::Finished | TaskState::Joined)
    }

    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Block until the task finishes and take its result
    ///
    /// Succeeds once per push; a second join fails with `TaskNotPushed`.
    pub fn join(&self) -> PoolResult<T> {
        let mut status = lock(&self.shared.status);
        loop {
            match transition(status.state, TaskEvent::Join)? {
                Outcome::Wait => {
                    status = self
                        .shared
                        .finished
                        .wait(status)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Outcome::Move(next, _) => {
                    status.state = next;
                    return status
                        .result
                        .take()
                        .unwrap_or(Err(PoolError::Unexpected("finished task has no result")));
                }
            }
        }
    }

    /// `join`, giving up with `Timeout` after `timeout`
    ///
    /// A timed-out task stays in the pool and can still be joined later.
    pub fn join_timeout(&self, timeout: Duration) -> PoolResult<T> {
        let deadline = Instant::now() + timeout;
        let mut status = lock(&self.shared.status);
        loop {
            match transition(status.state, TaskEvent::Join)? {
                Outcome::Wait => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PoolError::Timeout);
                    }
                    status = self
                        .shared
                        .finished
                        .wait_timeout(status, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                Outcome::Move(next, _) => {
                    status.state = next;
                    return status
                        .result
                        .take()
                        .unwrap_or(Err(PoolError::Unexpected("finished task has no result")));
                }
            }
        }
    }

    /// Stop caring about the result
    ///
    /// A finished task's result is dropped here; a queued or running one is
    /// dropped by its worker. Fails with `TaskNotPushed` for a task that is
    /// not in the pool.
    pub fn detach(self) -> Result<(), Rejected<Self>> {
        match self.release(TaskEvent::Detach) {
            Ok(()) => Ok(()),
            Err(error) => Err(Rejected { value: self, error }),
        }
    }

    /// Destroy a task that is not in the pool (`New` or `Joined`)
    pub fn delete(self) -> Result<(), Rejected<Self>> {
        match self.release(TaskEvent::Delete) {
            Ok(()) => Ok(()),
            Err(error) => Err(Rejected { value: self, error }),
        }
    }

    fn release(&self, event: TaskEvent) -> PoolResult<()> {
        let reclaimed = {
            let mut status = lock(&self.shared.status);
            match transition(status.state, event)? {
                Outcome::Move(next, reclaim) => {
                    status.state = next;
                    if reclaim == Reclaim::Caller {
                        status.result.take()
                    } else {
                        None
                    }
                }
                Outcome::Wait => None,
            }
        };
        drop(reclaimed);
        Ok(())
    }
}

impl<T: Send + 'static> Drop for Task<T> {
    fn drop(&mut self) {
        // Detach leftovers; idle tasks just go away with their Arc.
        let _ = self.release(TaskEvent::Detach);
    }
}

impl<T: Send + 'static> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("state", &self.state()).finish()
    }
}
