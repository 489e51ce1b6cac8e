//! Coroutine scheduler
//!
//! A table of coroutines keyed by `CoroId` plus a FIFO ready queue.
//! `run` pops the oldest ready id, polls it once, then folds every wake
//! that happened during that poll back into the ready queue in wake order.
//!
//! State rules:
//! - a poll that returns `Pending` leaves the coroutine `Blocked`
//! - a wake moves `Blocked` to `Ready` and queues the id, anything else
//!   is ignored (so a coroutine is queued at most once)
//! - a wake that lands while the coroutine is still `Running` is applied
//!   after the poll returns, so it is never lost

use crate::config::SchedulerConfig;
use crate::error::{SchedError, SchedResult};
use crate::tls::CoroGuard;
use crate::waker::{coro_waker, WakeList};

use corokit_core::id::CoroId;
use corokit_core::state::CoroState;
use corokit_core::{kdebug, kwarn};

use crossbeam_queue::SegQueue;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

type CoroFuture = Pin<Box<dyn Future<Output = ()>>>;

struct Slot {
    state: CoroState,
    /// Taken out for the duration of a poll
    future: Option<CoroFuture>,
    waker: Waker,
}

struct Core {
    config: SchedulerConfig,
    slots: RefCell<HashMap<CoroId, Slot>>,
    ready: RefCell<VecDeque<CoroId>>,
    woken: WakeList,
    next_id: Cell<u32>,
}

thread_local! {
    /// Scheduler whose `run` is on this thread's stack
    static CONTEXT: RefCell<Option<Rc<Core>>> = const { RefCell::new(None) };
}

struct ContextGuard {
    prev: Option<Rc<Core>>,
}

impl ContextGuard {
    fn enter(core: &Rc<Core>) -> Self {
        let prev = CONTEXT.with(|c| c.replace(Some(Rc::clone(core))));
        ContextGuard { prev }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CONTEXT.with(|c| {
            c.replace(prev);
        });
    }
}

/// Summary of one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub polls: u64,
    pub finished: usize,
    /// Coroutines left suspended with nobody scheduled to wake them
    pub blocked: usize,
}

impl Core {
    fn spawn(&self, future: CoroFuture) -> SchedResult<CoroId> {
        let mut slots = self.slots.borrow_mut();
        if slots.len() >= self.config.max_coroutines {
            return Err(SchedError::TooManyCoroutines);
        }
        let raw = self.next_id.get();
        let next = raw
            .checked_add(1)
            .filter(|n| CoroId::new(*n).is_some())
            .ok_or(SchedError::TooManyCoroutines)?;
        self.next_id.set(next);

        let id = CoroId::new(raw);
        slots.insert(
            id,
            Slot {
                state: CoroState::Ready,
                future: Some(future),
                waker: coro_waker(id, &self.woken),
            },
        );
        self.ready.borrow_mut().push_back(id);

        if self.config.debug_logging {
            kdebug!("spawned {}", id);
        }
        Ok(id)
    }

    fn drain_woken(&self) {
        while let Some(id) = self.woken.pop() {
            let mut slots = self.slots.borrow_mut();
            if let Some(slot) = slots.get_mut(&id) {
                if slot.state.accepts_wake() {
                    slot.state = CoroState::Ready;
                    self.ready.borrow_mut().push_back(id);
                }
            }
        }
    }

    /// Poll `id` once. Returns true if it finished.
    fn poll_coro(&self, id: CoroId) -> bool {
        let (mut future, waker) = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(&id) else {
                return false;
            };
            if !slot.state.is_runnable() {
                return false;
            }
            let Some(future) = slot.future.take() else {
                return false;
            };
            slot.state = CoroState::Running;
            (future, slot.waker.clone())
        };

        let poll = {
            let _current = CoroGuard::enter(id);
            let mut cx = Context::from_waker(&waker);
            future.as_mut().poll(&mut cx)
        };

        match poll {
            Poll::Ready(()) => {
                self.slots.borrow_mut().remove(&id);
                // Destructors may spawn or wake, so no borrow is held here.
                drop(future);
                if self.config.debug_logging {
                    kdebug!("{} finished", id);
                }
                true
            }
            Poll::Pending => {
                if let Some(slot) = self.slots.borrow_mut().get_mut(&id) {
                    slot.future = Some(future);
                    slot.state = CoroState::Blocked;
                }
                false
            }
        }
    }

    fn blocked_count(&self) -> usize {
        self.slots
            .borrow()
            .values()
            .filter(|s| s.state == CoroState::Blocked)
            .count()
    }
}

/// Single-thread cooperative scheduler
///
/// Not `Send`: coroutines and everything they share live on the thread
/// that owns the scheduler.
pub struct Scheduler {
    core: Rc<Core>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> SchedResult<Self> {
        config.validate().map_err(SchedError::InvalidConfig)?;
        Ok(Self::build(config))
    }

    fn build(config: SchedulerConfig) -> Self {
        Scheduler {
            core: Rc::new(Core {
                config,
                slots: RefCell::new(HashMap::new()),
                ready: RefCell::new(VecDeque::new()),
                woken: Arc::new(SegQueue::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Queue a new coroutine at the tail of the ready queue
    pub fn spawn<F>(&self, future: F) -> SchedResult<CoroId>
    where
        F: Future<Output = ()> + 'static,
    {
        self.core.spawn(Box::pin(future))
    }

    /// Poll ready coroutines until none are left
    pub fn run(&self) -> SchedResult<RunReport> {
        let _ctx = ContextGuard::enter(&self.core);
        let mut report = RunReport::default();

        loop {
            self.core.drain_woken();
            let Some(id) = self.core.ready.borrow_mut().pop_front() else {
                break;
            };
            if let Some(budget) = self.core.config.poll_budget {
                if report.polls >= budget {
                    self.core.ready.borrow_mut().push_front(id);
                    return Err(SchedError::BudgetExhausted { polls: report.polls });
                }
            }
            report.polls += 1;
            if self.core.poll_coro(id) {
                report.finished += 1;
            }
        }

        report.blocked = self.core.blocked_count();
        if report.blocked > 0 {
            kwarn!(
                "scheduler stalled: {} coroutines blocked with no pending wakeup",
                report.blocked
            );
        }
        Ok(report)
    }

    /// Poll the oldest ready coroutine once. Returns false if none was ready.
    pub fn run_one(&self) -> bool {
        let _ctx = ContextGuard::enter(&self.core);
        self.core.drain_woken();
        let next = self.core.ready.borrow_mut().pop_front();
        match next {
            Some(id) => {
                self.core.poll_coro(id);
                self.core.drain_woken();
                true
            }
            None => false,
        }
    }

    /// State of `id`; ids that finished report `Finished`, unknown ids `None`
    pub fn state_of(&self, id: CoroId) -> Option<CoroState> {
        if let Some(slot) = self.core.slots.borrow().get(&id) {
            return Some(slot.state);
        }
        if id.is_some() && id.as_u32() < self.core.next_id.get() {
            Some(CoroState::Finished)
        } else {
            None
        }
    }

    /// Live (unfinished) coroutines
    pub fn len(&self) -> usize {
        self.core.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn blocked_count(&self) -> usize {
        self.core.blocked_count()
    }

    pub fn ready_count(&self) -> usize {
        self.core.drain_woken();
        self.core.ready.borrow().len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::build(SchedulerConfig::default())
    }
}

/// Spawn onto the scheduler currently running on this thread
///
/// Valid only from inside a coroutine (or a destructor running during a
/// `run`); anywhere else fails with `NotInitialized`.
pub fn spawn<F>(future: F) -> SchedResult<CoroId>
where
    F: Future<Output = ()> + 'static,
{
    let core = CONTEXT.with(|c| c.borrow().clone());
    match core {
        Some(core) => core.spawn(Box::pin(future)),
        None => Err(SchedError::NotInitialized),
    }
}

/// Run `future` as the root coroutine and return its output
///
/// Fails with `Deadlock` if the ready queue empties while the root is
/// still suspended.
pub fn block_on<T, F>(config: SchedulerConfig, future: F) -> SchedResult<T>
where
    T: 'static,
    F: Future<Output = T> + 'static,
{
    let sched = Scheduler::new(config)?;
    let output = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&output);
    sched.spawn(async move {
        let value = future.await;
        *slot.borrow_mut() = Some(value);
    })?;

    let report = sched.run()?;
    let value = output.borrow_mut().take();
    value.ok_or(SchedError::Deadlock {
        blocked: report.blocked,
    })
}
