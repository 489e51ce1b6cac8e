//! Error types for the chat transport

use core::fmt;
use std::io;

use nix::errno::Errno;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatError {
    /// `update` or `feed` before `connect`/`listen`, or after teardown
    NotStarted,

    /// Second `connect` or `listen` on the same endpoint
    AlreadyStarted,

    /// Malformed address or empty input
    InvalidArgument,

    /// An OS call failed; the connection it belonged to is gone
    Sys(io::ErrorKind),

    /// Nothing became ready before the deadline
    Timeout,

    /// `listen` port is taken (`EADDRINUSE`)
    PortBusy,

    /// Host name did not resolve to an IPv4 address
    NoAddr,
}

impl ChatError {
    /// Build from the calling thread's current errno
    pub fn last_os() -> Self {
        Self::from_errno(Errno::last())
    }

    pub fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::EADDRINUSE => ChatError::PortBusy,
            other => ChatError::Sys(io::Error::from_raw_os_error(other as i32).kind()),
        }
    }

    /// Every error except `Timeout` means the call did not do its job
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChatError::Timeout)
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::NotStarted => write!(f, "endpoint is not started"),
            ChatError::AlreadyStarted => write!(f, "endpoint is already started"),
            ChatError::InvalidArgument => write!(f, "invalid argument"),
            ChatError::Sys(kind) => write!(f, "system error: {}", kind),
            ChatError::Timeout => write!(f, "timed out"),
            ChatError::PortBusy => write!(f, "port is already in use"),
            ChatError::NoAddr => write!(f, "address did not resolve"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<io::Error> for ChatError {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => ChatError::from_errno(Errno::from_raw(code)),
            None => ChatError::Sys(err.kind()),
        }
    }
}
