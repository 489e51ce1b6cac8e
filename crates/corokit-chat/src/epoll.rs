//! Edge-triggered epoll poller (Linux)
//!
//! Every descriptor is registered with `EPOLLET | EPOLLRDHUP`, so callers
//! must drain reads and writes to `EAGAIN` before waiting again.

use crate::error::{ChatError, ChatResult};
use crate::interest::Interest;
use crate::poller::{Event, Poller};

use nix::errno::Errno;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

pub struct EpollPoller {
    epfd: OwnedFd,
    buf: Vec<libc::epoll_event>,
}

impl EpollPoller {
    /// Poller returning at most `max_events` events per wait
    pub fn new(max_events: usize) -> ChatResult<Self> {
        if max_events == 0 {
            return Err(ChatError::InvalidArgument);
        }
        let fd = Errno::result(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })
            .map_err(ChatError::from_errno)?;
        Ok(EpollPoller {
            epfd: unsafe { OwnedFd::from_raw_fd(fd) },
            buf: vec![libc::epoll_event { events: 0, u64: 0 }; max_events],
        })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()> {
        let mut ev = libc::epoll_event {
            events: epoll_flags(interest),
            u64: token,
        };
        Errno::result(unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), op, fd, &mut ev) })
            .map(drop)
            .map_err(ChatError::from_errno)
    }
}

impl AsRawFd for EpollPoller {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd.as_raw_fd()
    }
}

fn epoll_flags(interest: Interest) -> u32 {
    let mut flags = (libc::EPOLLET | libc::EPOLLRDHUP) as u32;
    if interest.contains(Interest::INPUT) {
        flags |= libc::EPOLLIN as u32;
    }
    if interest.contains(Interest::OUTPUT) {
        flags |= libc::EPOLLOUT as u32;
    }
    flags
}

/// Milliseconds for `epoll_wait`, rounding up so a short timeout never
/// becomes a busy poll
fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = d.as_nanos().div_ceil(1_000_000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

impl Poller for EpollPoller {
    fn add(&mut self, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest)
    }

    fn modify(&mut self, fd: RawFd, token: u64, interest: Interest) -> ChatResult<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest)
    }

    fn delete(&mut self, fd: RawFd) -> ChatResult<()> {
        let ret = unsafe {
            libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
        };
        match Errno::result(ret) {
            Ok(_) | Err(Errno::ENOENT) | Err(Errno::EBADF) => Ok(()),
            Err(errno) => Err(ChatError::from_errno(errno)),
        }
    }

    fn wait(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> ChatResult<usize> {
        events.clear();
        let ret = unsafe {
            libc::epoll_wait(
                self.epfd.as_raw_fd(),
                self.buf.as_mut_ptr(),
                self.buf.len() as libc::c_int,
                timeout_ms(timeout),
            )
        };
        let n = match Errno::result(ret) {
            Ok(n) => n as usize,
            Err(Errno::EINTR) => return Ok(0),
            Err(errno) => return Err(ChatError::from_errno(errno)),
        };

        for raw in &self.buf[..n] {
            let flags = raw.events;
            events.push(Event {
                token: raw.u64,
                readable: flags & libc::EPOLLIN as u32 != 0,
                writable: flags & libc::EPOLLOUT as u32 != 0,
                hangup: flags & (libc::EPOLLHUP | libc::EPOLLRDHUP) as u32 != 0,
                error: flags & libc::EPOLLERR as u32 != 0,
            });
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0 as libc::c_int; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(ret, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn test_timeout_rounds_up() {
        assert_eq!(timeout_ms(None), -1);
        assert_eq!(timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_ms(Some(Duration::from_micros(1))), 1);
        assert_eq!(timeout_ms(Some(Duration::from_millis(25))), 25);
    }

    #[test]
    fn test_pipe_readiness_is_edge_triggered() {
        let mut poller = EpollPoller::new(4).unwrap();
        let (rx, tx) = pipe();
        poller.add(rx.as_raw_fd(), 11, Interest::INPUT).unwrap();

        let mut events = Vec::new();
        assert_eq!(poller.wait(&mut events, Some(Duration::ZERO)).unwrap(), 0);

        let n = unsafe { libc::write(tx.as_raw_fd(), b"x".as_ptr().cast(), 1) };
        assert_eq!(n, 1);
        assert_eq!(poller.wait(&mut events, Some(Duration::from_millis(100))).unwrap(), 1);
        assert_eq!(events[0].token, 11);
        assert!(events[0].readable);

        // Not drained, but no new edge: nothing reported.
        assert_eq!(poller.wait(&mut events, Some(Duration::ZERO)).unwrap(), 0);

        drop(tx);
        assert_eq!(poller.wait(&mut events, Some(Duration::from_millis(100))).unwrap(), 1);
        assert!(events[0].hangup);

        poller.delete(rx.as_raw_fd()).unwrap();
        poller.delete(rx.as_raw_fd()).unwrap();
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(EpollPoller::new(0), Err(ChatError::InvalidArgument)));
    }
}
