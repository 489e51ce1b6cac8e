//! Coroutine identifier type

use core::fmt;

use crate::constants::CORO_NONE;

/// Identifier of a coroutine within one scheduler
///
/// Ids are handed out in spawn order and never reused by the same
/// scheduler. The maximum value (u32::MAX) is reserved as a sentinel
/// for "no coroutine".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CoroId(u32);

impl CoroId {
    /// Sentinel value indicating no coroutine
    pub const NONE: CoroId = CoroId(CORO_NONE);

    #[inline]
    pub const fn new(id: u32) -> Self {
        CoroId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == CORO_NONE
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != CORO_NONE
    }
}

impl From<u32> for CoroId {
    #[inline]
    fn from(id: u32) -> Self {
        CoroId(id)
    }
}

impl From<CoroId> for u32 {
    #[inline]
    fn from(id: CoroId) -> Self {
        id.0
    }
}

impl fmt::Debug for CoroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "CoroId(NONE)")
        } else {
            write!(f, "CoroId({})", self.0)
        }
    }
}

impl fmt::Display for CoroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "coro#{}", self.0)
        }
    }
}

impl Default for CoroId {
    fn default() -> Self {
        CoroId::NONE
    }
}
