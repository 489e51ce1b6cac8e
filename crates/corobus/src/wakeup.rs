//! FIFO wakeup queue
//!
//! Coroutines park at the tail and are resumed from the head. A waiter is
//! removed from the queue either by the wakeup itself or, for a spurious
//! resume or a cancelled wait, by its own guard, so it is never queued
//! twice and never left behind.

use corokit_core::id::CoroId;
use corokit_runtime::{current_id, suspend_until};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::task::Waker;

struct Waiter {
    ticket: u64,
    id: CoroId,
    waker: Waker,
}

#[derive(Default)]
pub struct WakeupQueue {
    waiters: RefCell<VecDeque<Waiter>>,
    next_ticket: Cell<u64>,
}

/// Drops the waiter's entry if it is still queued when the wait ends
struct Entry<'a> {
    queue: &'a WakeupQueue,
    ticket: u64,
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        self.queue
            .waiters
            .borrow_mut()
            .retain(|w| w.ticket != self.ticket);
    }
}

impl WakeupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waiters.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.borrow().is_empty()
    }

    /// Ids of queued coroutines, oldest first
    pub fn waiting_ids(&self) -> Vec<CoroId> {
        self.waiters.borrow().iter().map(|w| w.id).collect()
    }

    /// Suspend the current coroutine at the tail until a wakeup reaches it
    pub async fn wait(&self) {
        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);
        let _entry = Entry { queue: self, ticket };

        suspend_until(|waker| {
            self.waiters.borrow_mut().push_back(Waiter {
                ticket,
                id: current_id(),
                waker: waker.clone(),
            });
        })
        .await;
    }

    /// Resume the oldest waiter. No-op on an empty queue.
    pub fn wakeup_first(&self) -> bool {
        let head = self.waiters.borrow_mut().pop_front();
        match head {
            Some(waiter) => {
                waiter.waker.wake();
                true
            }
            None => false,
        }
    }

    /// Resume up to `n` waiters in FIFO order, returning how many were woken
    pub fn wakeup_n(&self, n: usize) -> usize {
        let mut woken = 0;
        while woken < n && self.wakeup_first() {
            woken += 1;
        }
        woken
    }

    pub fn wakeup_all(&self) -> usize {
        let drained: Vec<Waiter> = self.waiters.borrow_mut().drain(..).collect();
        let count = drained.len();
        for waiter in drained {
            waiter.waker.wake();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corokit_runtime::Scheduler;
    use std::rc::Rc;

    #[test]
    fn test_wakeup_empty_is_noop() {
        let queue = WakeupQueue::new();
        assert!(!queue.wakeup_first());
        assert_eq!(queue.wakeup_all(), 0);
        assert_eq!(queue.wakeup_n(3), 0);
    }

    #[test]
    fn test_wakeup_order_is_fifo() {
        let sched = Scheduler::default();
        let queue = Rc::new(WakeupQueue::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut ids = Vec::new();
        for i in 0..3 {
            let (q, o) = (queue.clone(), order.clone());
            ids.push(
                sched
                    .spawn(async move {
                        q.wait().await;
                        o.borrow_mut().push(i);
                    })
                    .unwrap(),
            );
        }
        sched.run().unwrap();
        assert_eq!(queue.waiting_ids(), ids);

        assert!(queue.wakeup_first());
        sched.run().unwrap();
        assert_eq!(*order.borrow(), [0]);

        assert_eq!(queue.wakeup_n(5), 2);
        sched.run().unwrap();
        assert_eq!(*order.borrow(), [0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dropped_wait_leaves_queue() {
        let sched = Scheduler::default();
        let queue = Rc::new(WakeupQueue::new());
        let q = queue.clone();
        sched.spawn(async move { q.wait().await }).unwrap();
        sched.run().unwrap();
        assert_eq!(queue.len(), 1);

        // Dropping the scheduler drops the suspended future and its entry.
        drop(sched);
        assert!(queue.is_empty());
    }
}
