//! Coroutine lifecycle states

/// State of a coroutine inside the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroState {
    /// In the ready queue, waiting for a poll
    Ready,

    /// Currently being polled
    Running,

    /// Suspended until its waker fires
    Blocked,

    /// Future returned `Ready`, slot released
    Finished,
}

impl CoroState {
    /// Check if this state allows the coroutine to be polled
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, CoroState::Ready)
    }

    /// A wake only has an effect on a blocked coroutine
    #[inline]
    pub const fn accepts_wake(&self) -> bool {
        matches!(self, CoroState::Blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(CoroState::Ready.is_runnable());
        assert!(!CoroState::Blocked.is_runnable());
        assert!(CoroState::Blocked.accepts_wake());
        assert!(!CoroState::Ready.accepts_wake());
    }
}
