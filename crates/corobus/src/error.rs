//! Error types for the channel bus

use core::fmt;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusError {
    /// Handle never opened, already closed, channel closed while waiting,
    /// zero capacity, or no channels at all for a broadcast
    NoChannel,

    /// Non-blocking variant found the channel full (send) or empty (recv)
    WouldBlock,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::NoChannel => write!(f, "no such channel"),
            BusError::WouldBlock => write!(f, "operation would block"),
        }
    }
}

impl std::error::Error for BusError {}
