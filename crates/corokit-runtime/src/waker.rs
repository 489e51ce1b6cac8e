//! Wakers that report coroutine ids back to the scheduler
//!
//! `Waker` must be `Send + Sync`, so the wake list is a lock-free
//! `SegQueue` even though every coroutine lives on one thread. The
//! scheduler drains it after each poll and decides which ids become ready.

use corokit_core::id::CoroId;
use crossbeam_queue::SegQueue;
use std::sync::Arc;
use std::task::{Wake, Waker};

/// Ids woken since the scheduler last looked, in wake order
pub(crate) type WakeList = Arc<SegQueue<CoroId>>;

struct CoroWaker {
    id: CoroId,
    woken: WakeList,
}

impl Wake for CoroWaker {
    fn wake(self: Arc<Self>) {
        self.woken.push(self.id);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.push(self.id);
    }
}

pub(crate) fn coro_waker(id: CoroId, woken: &WakeList) -> Waker {
    Waker::from(Arc::new(CoroWaker {
        id,
        woken: Arc::clone(woken),
    }))
}
