//! Readiness source abstraction
//!
//! `Poller` is the multiplexer seam: the epoll implementation lives in
//! `epoll`, tests substitute a recording fake. `Registration` keeps the
//! interest last handed to the poller for one descriptor and only calls
//! `add`/`modify`/`delete` when the wanted interest differs from it.

use crate::error::ChatResult;
use crate::interest::Interest;

use std::os::fd::RawFd;
use std::time::Duration;

/// One readiness report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Event {
    pub token: u64,
    pub readable: bool,
    pub writable: bool,
    /// Peer closed its side (`EPOLLHUP` or `EPOLLRDHUP`)
    pub hangup: bool,
    pub error: bool,
}

pub trait Poller {
    fn add(&mut self, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()>;
    fn modify(&mut self, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()>;
    fn delete(&mut self, fd: RawFd) -> ChatResult<()>;

    /// Replace `events` with what is ready, waiting up to `timeout`
    /// (`None` waits forever). Returns the number of events.
    fn wait(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> ChatResult<usize>;
}

#[derive(Debug)]
pub struct Registration {
    token: u64,
    current: Option<Interest>,
}

impl Registration {
    pub fn new(token: u64) -> Self {
        Registration {
            token,
            current: None,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Interest the poller currently holds, `None` when not registered
    pub fn interest(&self) -> Option<Interest> {
        self.current
    }

    /// Bring the poller in line with `desired`; returns whether a call
    /// was made. Empty interest removes the descriptor.
    pub fn update<P: Poller + ?Sized>(
        &mut self,
        poller: &mut P,
        fd: RawFd,
        desired: Interest,
    ) -> ChatResult<bool> {
        match self.current {
            Some(current) if current == desired => return Ok(false),
            None if desired.is_empty() => return Ok(false),
            Some(_) if desired.is_empty() => {
                self.current = None;
                poller.delete(fd)?;
            }
            Some(_) => {
                poller.modify(fd, self.token, desired)?;
                self.current = Some(desired);
            }
            None => {
                poller.add(fd, self.token, desired)?;
                self.current = Some(desired);
            }
        }
        Ok(true)
    }

    pub fn deregister<P: Poller + ?Sized>(&mut self, poller: &mut P, fd: RawFd) -> ChatResult<()> {
        if self.current.take().is_some() {
            poller.delete(fd)?;
        }
        Ok(())
    }
}

/// Recording poller whose `wait` hands back scripted events
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::ChatError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Add(RawFd, u64, Interest),
        Modify(RawFd, u64, Interest),
        Delete(RawFd),
    }

    #[derive(Default)]
    pub(crate) struct FakePoller {
        pub(crate) calls: Vec<Call>,
        pub(crate) ready: Vec<Event>,
        pub(crate) fail_next: bool,
    }

    impl FakePoller {
        fn record(&mut self, call: Call) -> ChatResult<()> {
            if std::mem::take(&mut self.fail_next) {
                return Err(ChatError::Sys(std::io::ErrorKind::Other));
            }
            self.calls.push(call);
            Ok(())
        }

        /// Interest changes made for `token`, in order, leaving the rest
        pub(crate) fn take_changes(&mut self, token: u64) -> Vec<Interest> {
            let mut changes = Vec::new();
            self.calls.retain(|call| match *call {
                Call::Add(_, t, interest) | Call::Modify(_, t, interest) if t == token => {
                    changes.push(interest);
                    false
                }
                _ => true,
            });
            changes
        }
    }

    impl Poller for FakePoller {
        fn add(&mut self, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()> {
            self.record(Call::Add(fd, token, interest))
        }

        fn modify(&mut self, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()> {
            self.record(Call::Modify(fd, token, interest))
        }

        fn delete(&mut self, fd: RawFd) -> ChatResult<()> {
            self.record(Call::Delete(fd))
        }

        fn wait(&mut self, events: &mut Vec<Event>, _timeout: Option<Duration>) -> ChatResult<usize> {
            events.clear();
            events.append(&mut self.ready);
            Ok(events.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{Call, FakePoller};
    use super::*;

    #[test]
    fn test_only_changes_reach_poller() {
        let mut poller = FakePoller::default();
        let mut reg = Registration::new(7);

        assert_eq!(reg.update(&mut poller, 3, Interest::INPUT), Ok(true));
        assert_eq!(reg.update(&mut poller, 3, Interest::INPUT), Ok(false));
        let both = Interest::INPUT | Interest::OUTPUT;
        assert_eq!(reg.update(&mut poller, 3, both), Ok(true));
        assert_eq!(reg.update(&mut poller, 3, both), Ok(false));
        assert_eq!(reg.update(&mut poller, 3, Interest::INPUT), Ok(true));
        assert_eq!(reg.update(&mut poller, 3, Interest::NONE), Ok(true));
        assert_eq!(reg.update(&mut poller, 3, Interest::NONE), Ok(false));

        assert_eq!(
            poller.calls,
            vec![
                Call::Add(3, 7, Interest::INPUT),
                Call::Modify(3, 7, both),
                Call::Modify(3, 7, Interest::INPUT),
                Call::Delete(3),
            ]
        );
        assert_eq!(reg.interest(), None);
    }

    #[test]
    fn test_failed_call_keeps_old_interest() {
        let mut poller = FakePoller::default();
        let mut reg = Registration::new(1);
        reg.update(&mut poller, 5, Interest::INPUT).unwrap();

        poller.fail_next = true;
        assert!(reg.update(&mut poller, 5, Interest::INPUT | Interest::OUTPUT).is_err());
        assert_eq!(reg.interest(), Some(Interest::INPUT));

        // Retrying issues the modify again.
        assert_eq!(reg.update(&mut poller, 5, Interest::INPUT | Interest::OUTPUT), Ok(true));
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let mut poller = FakePoller::default();
        let mut reg = Registration::new(2);
        reg.deregister(&mut poller, 9).unwrap();
        reg.update(&mut poller, 9, Interest::OUTPUT).unwrap();
        reg.deregister(&mut poller, 9).unwrap();
        reg.deregister(&mut poller, 9).unwrap();
        assert_eq!(poller.calls, vec![Call::Add(9, 2, Interest::OUTPUT), Call::Delete(9)]);
    }

    #[test]
    fn test_fake_wait_drains_ready() {
        let mut poller = FakePoller::default();
        poller.ready.push(Event {
            token: 4,
            readable: true,
            ..Event::default()
        });
        let mut events = Vec::new();
        assert_eq!(poller.wait(&mut events, None), Ok(1));
        assert_eq!(events[0].token, 4);
        assert_eq!(poller.wait(&mut events, Some(Duration::ZERO)), Ok(0));
        assert!(events.is_empty());
    }
}
