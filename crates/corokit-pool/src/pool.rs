//! `ThreadPool` - bounded task queue served by lazily spawned workers.
//!
//! Workers are OS threads created on `push`, up to `max_threads`, and live
//! until shutdown. Each one waits on the pool condvar for work, pops the
//! oldest job, runs it with no pool lock held, and goes back to waiting.
//!
//! The pool mutex covers the worker counters, the shutdown flag and every
//! queue push and pop, so "queue empty and nobody running" is one
//! consistent observation for `shutdown`.

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult, Rejected};
use crate::task::{lock, Job, Task};

use corokit_core::{kdebug, kerror, kwarn};

use crossbeam_queue::ArrayQueue;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

struct PoolState {
    /// Live worker threads
    count: usize,
    /// Workers currently inside a task function
    active: usize,
    shutdown: bool,
    /// Workers ever spawned, for thread names
    spawned: usize,
    handles: Vec<thread::JoinHandle<()>>,
}

/// Shared state between the pool handle and workers.
struct PoolInner {
    config: PoolConfig,
    queue: ArrayQueue<Arc<dyn Job>>,
    state: Mutex<PoolState>,
    work_ready: Condvar,
}

pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    /// Pool with up to `max_threads` workers and the default queue size
    pub fn new(max_threads: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::new().max_threads(max_threads))
    }

    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        if let Err(why) = config.validate() {
            kwarn!("pool: rejected config: {}", why);
            return Err(PoolError::InvalidArgument);
        }
        let inner = Arc::new(PoolInner {
            queue: ArrayQueue::new(config.max_tasks),
            state: Mutex::new(PoolState {
                count: 0,
                active: 0,
                shutdown: false,
                spawned: 0,
                handles: Vec::with_capacity(config.max_threads),
            }),
            work_ready: Condvar::new(),
            config,
        });
        Ok(ThreadPool { inner })
    }

    /// Queue `task` for execution
    ///
    /// Spawns a worker first when there is thread budget left and the
    /// idle workers could not absorb the queue including this task.
    pub fn push<T: Send + 'static>(&self, task: &Task<T>) -> PoolResult<()> {
        let mut state = lock(&self.inner.state);
        if state.shutdown {
            return Err(PoolError::Unexpected("pool is shutting down"));
        }
        if self.inner.queue.is_full() {
            return Err(PoolError::TooManyTasks);
        }

        let job = task.job();
        let previous = job.state();
        job.mark_pushed()?;

        let idle = state.count - state.active;
        if state.count < self.inner.config.max_threads && self.inner.queue.len() + 1 > idle {
            if let Err(err) = self.spawn_worker(&mut state) {
                kerror!("pool: failed to spawn worker: {}", err);
                if state.count == 0 {
                    job.unmark_pushed(previous);
                    return Err(PoolError::Unexpected("thread spawn failed"));
                }
            }
        }

        if let Err(job) = self.inner.queue.push(job) {
            // Unreachable while pushes hold the pool lock.
            job.unmark_pushed(previous);
            return Err(PoolError::TooManyTasks);
        }
        self.inner.work_ready.notify_one();
        Ok(())
    }

    fn spawn_worker(&self, state: &mut PoolState) -> std::io::Result<()> {
        let n = state.spawned;
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.inner.config.thread_name_prefix, n))
            .spawn(move || worker_loop(inner, n))?;
        state.spawned += 1;
        state.count += 1;
        state.handles.push(handle);
        Ok(())
    }

    /// Worker threads created so far (never shrinks before shutdown)
    pub fn thread_count(&self) -> usize {
        lock(&self.inner.state).count
    }

    /// Workers currently running a task
    pub fn active_count(&self) -> usize {
        lock(&self.inner.state).active
    }

    /// Tasks waiting for a worker
    pub fn queued_count(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn max_threads(&self) -> usize {
        self.inner.config.max_threads
    }

    /// Stop and join every worker
    ///
    /// Refused with `HasTasks` while anything is queued or running; the
    /// pool is handed back unchanged in that case.
    pub fn shutdown(self) -> Result<(), Rejected<Self>> {
        let handles = {
            let mut state = lock(&self.inner.state);
            if !self.inner.queue.is_empty() || state.active > 0 {
                None
            } else {
                state.shutdown = true;
                self.inner.work_ready.notify_all();
                Some(std::mem::take(&mut state.handles))
            }
        };

        let Some(handles) = handles else {
            return Err(Rejected {
                value: self,
                error: PoolError::HasTasks,
            });
        };
        for handle in handles {
            if handle.join().is_err() {
                kwarn!("pool: worker panicked during shutdown");
            }
        }
        kdebug!("pool: shut down");
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let mut state = lock(&self.inner.state);
        state.shutdown = true;
        self.inner.work_ready.notify_all();
        // Workers drain the queue and exit on their own; a dropped pool
        // does not block on them. Call shutdown() to join.
    }
}

/// Worker thread main loop.
fn worker_loop(inner: Arc<PoolInner>, n: usize) {
    kdebug!("pool: worker {} started", n);
    loop {
        let job = {
            let mut state = lock(&inner.state);
            loop {
                if let Some(job) = inner.queue.pop() {
                    state.active += 1;
                    break Some(job);
                }
                if state.shutdown {
                    state.count -= 1;
                    break None;
                }
                state = inner
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Some(job) = job else {
            break;
        };
        job.run();
        drop(job);

        lock(&inner.state).active -= 1;
    }
    kdebug!("pool: worker {} exiting", n);
}
