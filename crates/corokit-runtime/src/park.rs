//! Suspension points
//!
//! The only two ways a coroutine gives up the thread. Both complete on
//! the poll after the one that suspended, so a spurious wake resumes the
//! caller early: callers that wait for a condition re-check it in a loop.

use std::future::poll_fn;
use std::task::{Poll, Waker};

/// Yield to the scheduler
///
/// The current coroutine goes to the tail of the ready queue, behind
/// everything already runnable.
pub async fn yield_now() {
    let mut yielded = false;
    poll_fn(move |cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

/// Park the current coroutine until woken
///
/// `register` runs exactly once, before the coroutine is marked blocked,
/// and receives the waker that resumes it. Nothing else will: a coroutine
/// whose waker is dropped without waking stays blocked.
pub async fn suspend_until<F>(register: F)
where
    F: FnOnce(&Waker),
{
    let mut register = Some(register);
    poll_fn(move |cx| match register.take() {
        Some(register) => {
            register(cx.waker());
            Poll::Pending
        }
        None => Poll::Ready(()),
    })
    .await
}
