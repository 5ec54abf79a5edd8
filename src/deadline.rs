//!The timeout vocabulary shared by [`crate::semaphore::Semaphore::wait`] and
//![`crate::group::Group::wait`].

use std::time::Instant;

///How long a `wait` call is willing to block.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    ///Don't block at all; if the wait can't be satisfied immediately, report a timeout.
    Immediate,
    ///Block until the primitive is signaled, however long that takes.
    Forever,
    ///Block until the primitive is signaled or the given instant passes, whichever
    ///comes first.
    At(Instant),
}

impl Deadline {
    ///A deadline `timeout` from now.
    pub fn after(timeout: std::time::Duration) -> Self {
        Deadline::At(Instant::now() + timeout)
    }
}

///The outcome of a `wait` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    ///The primitive was signaled (or, for a group, became quiescent) before the deadline.
    Signaled,
    ///The deadline passed first.
    TimedOut,
}

impl WaitResult {
    ///`true` if the wait returned because of a signal rather than a timeout.
    pub fn is_signaled(self) -> bool {
        self == WaitResult::Signaled
    }
}
