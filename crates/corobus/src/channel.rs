//! Bounded channel of `u32` values
//!
//! A FIFO of at most `capacity` values plus two wakeup queues. Every
//! primitive here is non-blocking; the bus builds the blocking variants by
//! looping over these and parking on the matching queue.
//!
//! Wake discipline:
//! - a push wakes as many receivers as values it added
//! - a pop wakes as many senders as slots it freed
//! - if room (or data) is left over afterwards, the next sender (or
//!   receiver) is woken too, so a waiter resumed for a slot it did not
//!   take never strands the ones behind it

use crate::error::{BusError, BusResult};
use crate::wakeup::WakeupQueue;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub struct Channel {
    capacity: usize,
    data: RefCell<VecDeque<u32>>,
    closed: Cell<bool>,
    pub(crate) send_queue: WakeupQueue,
    pub(crate) recv_queue: WakeupQueue,
}

impl Channel {
    pub(crate) fn new(capacity: usize) -> Self {
        Channel {
            capacity,
            data: RefCell::new(VecDeque::with_capacity(capacity)),
            closed: Cell::new(false),
            send_queue: WakeupQueue::new(),
            recv_queue: WakeupQueue::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn free(&self) -> usize {
        self.capacity - self.len()
    }

    fn check_open(&self) -> BusResult<()> {
        if self.closed.get() {
            Err(BusError::NoChannel)
        } else {
            Ok(())
        }
    }

    pub(crate) fn try_push(&self, value: u32) -> BusResult<()> {
        self.check_open()?;
        if self.is_full() {
            return Err(BusError::WouldBlock);
        }
        self.push_unchecked(value);
        Ok(())
    }

    /// Append without a capacity check; the caller verified there is room
    pub(crate) fn push_unchecked(&self, value: u32) {
        self.data.borrow_mut().push_back(value);
        self.recv_queue.wakeup_first();
        if !self.is_full() {
            self.send_queue.wakeup_first();
        }
    }

    pub(crate) fn try_pop(&self) -> BusResult<u32> {
        self.check_open()?;
        let value = self.data.borrow_mut().pop_front();
        match value {
            Some(value) => {
                self.send_queue.wakeup_first();
                if !self.is_empty() {
                    self.recv_queue.wakeup_first();
                }
                Ok(value)
            }
            None => Err(BusError::WouldBlock),
        }
    }

    /// Push as many of `values` as fit, in order. Fails with `WouldBlock`
    /// only when nothing fits.
    pub(crate) fn try_push_many(&self, values: &[u32]) -> BusResult<usize> {
        self.check_open()?;
        if values.is_empty() {
            return Ok(0);
        }
        let count = values.len().min(self.free());
        if count == 0 {
            return Err(BusError::WouldBlock);
        }
        self.data.borrow_mut().extend(&values[..count]);
        self.recv_queue.wakeup_n(count);
        if !self.is_full() {
            self.send_queue.wakeup_first();
        }
        Ok(count)
    }

    /// Pop up to `out.len()` values into `out`. Fails with `WouldBlock`
    /// only when the channel is empty.
    pub(crate) fn try_pop_many(&self, out: &mut [u32]) -> BusResult<usize> {
        self.check_open()?;
        if out.is_empty() {
            return Ok(0);
        }
        let count = {
            let mut data = self.data.borrow_mut();
            let count = out.len().min(data.len());
            for (slot, value) in out.iter_mut().zip(data.drain(..count)) {
                *slot = value;
            }
            count
        };
        if count == 0 {
            return Err(BusError::WouldBlock);
        }
        self.send_queue.wakeup_n(count);
        if !self.is_empty() {
            self.recv_queue.wakeup_first();
        }
        Ok(count)
    }

    /// Mark closed, drop buffered values and resume every waiter
    pub(crate) fn close(&self) -> usize {
        self.closed.set(true);
        self.data.borrow_mut().clear();
        self.send_queue.wakeup_all() + self.recv_queue.wakeup_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_bounds() {
        let ch = Channel::new(2);
        assert_eq!(ch.try_pop(), Err(BusError::WouldBlock));
        ch.try_push(1).unwrap();
        ch.try_push(2).unwrap();
        assert!(ch.is_full());
        assert_eq!(ch.try_push(3), Err(BusError::WouldBlock));
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.try_pop(), Ok(1));
        assert_eq!(ch.try_pop(), Ok(2));
        assert!(ch.is_empty());
    }

    #[test]
    fn test_push_many_partial() {
        let ch = Channel::new(3);
        assert_eq!(ch.try_push_many(&[1, 2, 3, 4, 5]), Ok(3));
        assert_eq!(ch.try_push_many(&[6]), Err(BusError::WouldBlock));
        assert_eq!(ch.try_push_many(&[]), Ok(0));

        let mut out = [0u32; 2];
        assert_eq!(ch.try_pop_many(&mut out), Ok(2));
        assert_eq!(out, [1, 2]);
        let mut out = [0u32; 8];
        assert_eq!(ch.try_pop_many(&mut out), Ok(1));
        assert_eq!(out[0], 3);
        assert_eq!(ch.try_pop_many(&mut out), Err(BusError::WouldBlock));
    }

    #[test]
    fn test_closed_channel_rejects_everything() {
        let ch = Channel::new(4);
        ch.try_push(9).unwrap();
        ch.close();
        assert!(ch.is_closed());
        assert!(ch.is_empty());
        assert_eq!(ch.try_push(1), Err(BusError::NoChannel));
        assert_eq!(ch.try_pop(), Err(BusError::NoChannel));
        assert_eq!(ch.try_push_many(&[1]), Err(BusError::NoChannel));
        assert_eq!(ch.try_pop_many(&mut [0]), Err(BusError::NoChannel));
    }
}
