//! Readiness interest bitmask
//!
//! The bit values are part of the public surface: callers driving their
//! own event loop map `INPUT` to `POLLIN` and `OUTPUT` to `POLLOUT`.

use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Interest(u8);

impl Interest {
    pub const NONE: Self = Self(0);
    pub const INPUT: Self = Self(1 << 0);
    pub const OUTPUT: Self = Self(1 << 1);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::INPUT.0 | Self::OUTPUT.0))
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// `poll(2)` event bits for this interest
    pub fn to_poll_events(self) -> libc::c_short {
        let mut events = 0;
        if self.contains(Self::INPUT) {
            events |= libc::POLLIN;
        }
        if self.contains(Self::OUTPUT) {
            events |= libc::POLLOUT;
        }
        events
    }

    /// `self` plus `other` when `cond` holds
    pub const fn with_if(self, other: Self, cond: bool) -> Self {
        if cond {
            Self(self.0 | other.0)
        } else {
            self
        }
    }
}

impl BitOr for Interest {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits() {
        let both = Interest::INPUT | Interest::OUTPUT;
        assert_eq!(both.bits(), 3);
        assert!(both.contains(Interest::INPUT));
        assert!(!Interest::INPUT.contains(Interest::OUTPUT));
        assert!(Interest::NONE.is_empty());
        assert_eq!(Interest::from_bits(0xff), both);
        assert_eq!(Interest::INPUT.with_if(Interest::OUTPUT, false), Interest::INPUT);
        assert_eq!(both.to_poll_events(), libc::POLLIN | libc::POLLOUT);
        assert_eq!(Interest::NONE.to_poll_events(), 0);
    }
}
