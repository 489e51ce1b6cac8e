//! Channel bus
//!
//! A table of bounded channels addressed by small integer handles.
//!
//! Handles: `open` takes the lowest free slot, so a closed handle may be
//! reissued to a new channel. Closing the highest handle shrinks the table.
//! A coroutine already blocked on a channel keeps the channel itself, not
//! the handle, so it observes the close (`NoChannel`) even if the handle is
//! reissued before it resumes.
//!
//! Every operation reports through its `Result`. `last_error` mirrors the
//! outcome of the most recent call on this bus (cleared on success) for
//! callers that want errno-style polling.

use crate::channel::Channel;
use crate::error::{BusError, BusResult};

use corokit_core::kdebug;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Channel handle within one bus
pub type Handle = usize;

enum Slot {
    Open(Rc<Channel>),
    Closed,
}

#[derive(Default)]
pub struct Bus {
    slots: RefCell<Vec<Slot>>,
    last_error: Cell<Option<BusError>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of the latest call: `None` after a success
    pub fn last_error(&self) -> Option<BusError> {
        self.last_error.get()
    }

    pub fn set_last_error(&self, error: Option<BusError>) {
        self.last_error.set(error);
    }

    fn record<T>(&self, result: BusResult<T>) -> BusResult<T> {
        self.last_error.set(result.as_ref().err().copied());
        result
    }

    fn channel(&self, handle: Handle) -> BusResult<Rc<Channel>> {
        match self.slots.borrow().get(handle) {
            Some(Slot::Open(ch)) => Ok(Rc::clone(ch)),
            _ => Err(BusError::NoChannel),
        }
    }

    fn lookup(&self, handle: Handle) -> BusResult<Rc<Channel>> {
        let found = self.channel(handle);
        if found.is_err() {
            self.last_error.set(Some(BusError::NoChannel));
        }
        found
    }

    fn open_channels(&self) -> Vec<Rc<Channel>> {
        self.slots
            .borrow()
            .iter()
            .filter_map(|slot| match slot {
                Slot::Open(ch) => Some(Rc::clone(ch)),
                Slot::Closed => None,
            })
            .collect()
    }

    /// Open a channel holding up to `capacity` values
    pub fn open(&self, capacity: usize) -> BusResult<Handle> {
        if capacity == 0 {
            return self.record(Err(BusError::NoChannel));
        }
        let channel = Rc::new(Channel::new(capacity));
        let handle = {
            let mut slots = self.slots.borrow_mut();
            match slots.iter().position(|s| matches!(s, Slot::Closed)) {
                Some(free) => {
                    slots[free] = Slot::Open(channel);
                    free
                }
                None => {
                    slots.push(Slot::Open(channel));
                    slots.len() - 1
                }
            }
        };
        kdebug!("bus: opened channel {} (capacity {})", handle, capacity);
        self.record(Ok(handle))
    }

    /// Close a channel, resuming every coroutine blocked on it with
    /// `NoChannel`
    pub fn close(&self, handle: Handle) -> BusResult<()> {
        let channel = {
            let mut slots = self.slots.borrow_mut();
            let channel = match slots.get(handle) {
                Some(Slot::Open(ch)) => Rc::clone(ch),
                _ => return self.record(Err(BusError::NoChannel)),
            };
            slots[handle] = Slot::Closed;
            while matches!(slots.last(), Some(Slot::Closed)) {
                slots.pop();
            }
            channel
        };
        let woken = channel.close();
        kdebug!("bus: closed channel {} ({} waiters woken)", handle, woken);
        self.record(Ok(()))
    }

    /// Send `value`, suspending while the channel is full
    pub async fn send(&self, handle: Handle, value: u32) -> BusResult<()> {
        let channel = self.lookup(handle)?;
        loop {
            match channel.try_push(value) {
                Err(BusError::WouldBlock) => channel.send_queue.wait().await,
                result => return self.record(result),
            }
        }
    }

    pub fn try_send(&self, handle: Handle, value: u32) -> BusResult<()> {
        let channel = self.lookup(handle)?;
        self.record(channel.try_push(value))
    }

    /// Receive the oldest value, suspending while the channel is empty
    pub async fn recv(&self, handle: Handle) -> BusResult<u32> {
        let channel = self.lookup(handle)?;
        loop {
            match channel.try_pop() {
                Err(BusError::WouldBlock) => channel.recv_queue.wait().await,
                result => return self.record(result),
            }
        }
    }

    pub fn try_recv(&self, handle: Handle) -> BusResult<u32> {
        let channel = self.lookup(handle)?;
        self.record(channel.try_pop())
    }

    /// Send a prefix of `values`, suspending only while the channel is full.
    /// Returns how many values were sent (at least one unless `values` is
    /// empty).
    pub async fn send_v(&self, handle: Handle, values: &[u32]) -> BusResult<usize> {
        let channel = self.lookup(handle)?;
        loop {
            match channel.try_push_many(values) {
                Err(BusError::WouldBlock) => channel.send_queue.wait().await,
                result => return self.record(result),
            }
        }
    }

    pub fn try_send_v(&self, handle: Handle, values: &[u32]) -> BusResult<usize> {
        let channel = self.lookup(handle)?;
        self.record(channel.try_push_many(values))
    }

    /// Receive up to `out.len()` values, suspending only while the channel
    /// is empty
    pub async fn recv_v(&self, handle: Handle, out: &mut [u32]) -> BusResult<usize> {
        let channel = self.lookup(handle)?;
        loop {
            match channel.try_pop_many(out) {
                Err(BusError::WouldBlock) => channel.recv_queue.wait().await,
                result => return self.record(result),
            }
        }
    }

    pub fn try_recv_v(&self, handle: Handle, out: &mut [u32]) -> BusResult<usize> {
        let channel = self.lookup(handle)?;
        self.record(channel.try_pop_many(out))
    }

    /// Send `value` to every open channel
    ///
    /// Nothing is written until every channel has room: while any is full
    /// the caller parks on the first full one, then re-checks the whole
    /// set (channels opened or closed meanwhile included).
    pub async fn broadcast(&self, value: u32) -> BusResult<()> {
        let mut woken_from: Option<Rc<Channel>> = None;
        loop {
            let channels = self.open_channels();
            if channels.is_empty() {
                return self.record(Err(BusError::NoChannel));
            }
            let Some(full) = channels.iter().find(|ch| ch.is_full()).cloned() else {
                for channel in &channels {
                    channel.push_unchecked(value);
                }
                return self.record(Ok(()));
            };
            // The slot we were woken for goes unused: hand the wakeup on.
            if let Some(prev) = woken_from.take() {
                if !Rc::ptr_eq(&prev, &full) && !prev.is_full() {
                    prev.send_queue.wakeup_first();
                }
            }
            drop(channels);
            full.send_queue.wait().await;
            woken_from = Some(full);
        }
    }

    /// Send `value` to every open channel, or to none if any is full
    pub fn try_broadcast(&self, value: u32) -> BusResult<()> {
        let channels = self.open_channels();
        if channels.is_empty() {
            return self.record(Err(BusError::NoChannel));
        }
        if channels.iter().any(|ch| ch.is_full()) {
            return self.record(Err(BusError::WouldBlock));
        }
        for channel in &channels {
            channel.push_unchecked(value);
        }
        self.record(Ok(()))
    }

    /// Number of open channels
    pub fn channel_count(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|s| matches!(s, Slot::Open(_)))
            .count()
    }

    pub fn capacity(&self, handle: Handle) -> BusResult<usize> {
        self.record(self.channel(handle).map(|ch| ch.capacity()))
    }

    /// Values currently buffered in a channel
    pub fn len(&self, handle: Handle) -> BusResult<usize> {
        self.record(self.channel(handle).map(|ch| ch.len()))
    }

    /// Coroutines parked on a channel as (senders, receivers)
    pub fn waiters(&self, handle: Handle) -> BusResult<(usize, usize)> {
        self.record(
            self.channel(handle)
                .map(|ch| (ch.send_queue.len(), ch.recv_queue.len())),
        )
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        for slot in self.slots.get_mut().drain(..) {
            if let Slot::Open(channel) = slot {
                channel.close();
            }
        }
    }
}
