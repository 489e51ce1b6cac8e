//! Thread-local storage for coroutine context
//!
//! Holds the id of the coroutine currently being polled on this thread.

use corokit_core::constants::CORO_NONE;
use corokit_core::id::CoroId;
use std::cell::Cell;

thread_local! {
    /// Coroutine being polled right now, `CORO_NONE` between polls
    static CURRENT_CORO: Cell<u32> = const { Cell::new(CORO_NONE) };
}

/// Set the current coroutine, returning the previous one
#[inline]
pub(crate) fn set_current_coro(id: CoroId) -> CoroId {
    CoroId::new(CURRENT_CORO.with(|cell| cell.replace(id.as_u32())))
}

/// Id of the coroutine being polled, `CoroId::NONE` outside of one
#[inline]
pub fn current_id() -> CoroId {
    CoroId::new(CURRENT_CORO.with(|cell| cell.get()))
}

#[inline]
pub fn is_in_coro() -> bool {
    current_id().is_some()
}

/// Restores the previous current coroutine when dropped, including on
/// unwind out of a poll.
pub(crate) struct CoroGuard {
    prev: CoroId,
}

impl CoroGuard {
    pub(crate) fn enter(id: CoroId) -> Self {
        CoroGuard { prev: set_current_coro(id) }
    }
}

impl Drop for CoroGuard {
    fn drop(&mut self) {
        set_current_coro(self.prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_previous() {
        assert!(current_id().is_none());
        {
            let _outer = CoroGuard::enter(CoroId::new(1));
            assert_eq!(current_id(), CoroId::new(1));
            {
                let _inner = CoroGuard::enter(CoroId::new(2));
                assert_eq!(current_id(), CoroId::new(2));
                assert!(is_in_coro());
            }
            assert_eq!(current_id(), CoroId::new(1));
        }
        assert!(!is_in_coro());
    }
}
