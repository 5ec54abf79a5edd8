//!The counting semaphore (§4.3/§4.4): an atomic fast path backed by the kernel adapter
//!on contention.

use core::sync::atomic::{AtomicIsize, Ordering};
use std::time::Instant;

use crate::deadline::{Deadline, WaitResult};
use crate::error::fatal;
use crate::sys::KernelSem;

///A counting semaphore.
///
///`signal` increments the count, waking one waiter if any are blocked; `wait` decrements
///it, blocking the caller if the count would go negative. Uncontended `signal`/`wait`
///pairs never touch the kernel - they're a single atomic fetch-add each.
pub struct Semaphore {
    value: AtomicIsize,
    orig: isize,
    sent_ksignals: AtomicIsize,
    kernel: KernelSem,
}

impl Semaphore {
    ///Creates a semaphore with the given initial count.
    ///
    ///Returns `None` if `value` is negative - a semaphore never starts already "in
    ///debt".
    pub fn new(value: isize) -> Option<Self> {
        if value < 0 {
            return None;
        }

        Some(Self {
            value: AtomicIsize::new(value),
            orig: value,
            sent_ksignals: AtomicIsize::new(0),
            kernel: KernelSem::new(),
        })
    }

    ///Increments the count, waking one blocked waiter if the increment makes the count
    ///non-negative.
    pub fn signal(&self) {
        let post = self.value.fetch_add(1, Ordering::Release).wrapping_add(1);
        if post > 0 {
            // Fast path: no one was waiting.
            return;
        }
        if post == isize::MIN {
            fatal("unbalanced call to Semaphore::signal");
        }
        self.signal_slow();
    }

    #[cold]
    fn signal_slow(&self) {
        // Once sent_ksignals is visible, a waiter may return and this Semaphore could be
        // dropped out from under us before the kernel call below runs; callers are
        // expected to keep their own Semaphore alive across this call (matching
        // libdispatch's explicit retain here), which Rust's ownership model already
        // guarantees as long as `&self` is valid for the call's duration.
        self.sent_ksignals.fetch_add(1, Ordering::Relaxed);
        self.kernel.ensure();
        self.kernel.signal();
    }

    ///Decrements the count, blocking the caller per `deadline` if the count would go
    ///negative.
    pub fn wait(&self, deadline: Deadline) -> WaitResult {
        let post = self.value.fetch_sub(1, Ordering::Acquire).wrapping_sub(1);
        if post >= 0 {
            return WaitResult::Signaled;
        }
        self.wait_slow(deadline)
    }

    #[cold]
    fn wait_slow(&self, deadline: Deadline) -> WaitResult {
        loop {
            if self.drain_ksignal() {
                return WaitResult::Signaled;
            }

            self.kernel.ensure();

            let timed_out = match deadline {
                Deadline::Immediate => true,
                Deadline::Forever => {
                    self.kernel.wait_forever();
                    false
                }
                Deadline::At(at) => !self.wait_until(at),
            };

            if timed_out {
                if self.try_undo_decrement() {
                    return WaitResult::TimedOut;
                }
                // Lost the race: a concurrent `signal` already saw `value` go
                // non-negative, so its kernel signal is guaranteed to arrive. Block for
                // it instead of reporting a spurious timeout.
                self.kernel.wait_forever();
            }
            // goto 1: redrain sent_ksignals.
        }
    }

    fn drain_ksignal(&self) -> bool {
        loop {
            let orig = self.sent_ksignals.load(Ordering::Relaxed);
            if orig <= 0 {
                return false;
            }
            if self
                .sent_ksignals
                .compare_exchange_weak(orig, orig - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn wait_until(&self, at: Instant) -> bool {
        let now = Instant::now();
        if now >= at {
            return false;
        }
        self.kernel.wait_timeout(at - now)
    }

    ///Tries to undo the fast-path decrement via CAS while `value` is still negative.
    ///Returns `false` if a concurrent `signal` already moved `value` to non-negative -
    ///the caller must then block for that signal's kernel wakeup rather than treat the
    ///race as a timeout.
    fn try_undo_decrement(&self) -> bool {
        loop {
            let orig = self.value.load(Ordering::Relaxed);
            if orig >= 0 {
                return false;
            }
            if self
                .value
                .compare_exchange_weak(orig, orig + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    ///Forces destruction now (rather than at end of scope) so the disposal invariant is
    ///checked at a specific point. Equivalent to `drop(sem)`; provided because the
    ///explicit `dispose` operation is part of the specified interface.
    pub fn dispose(self) {}

    fn check_disposable(&self) {
        if self.value.load(Ordering::Acquire) != self.orig {
            fatal("semaphore disposed while in use");
        }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.check_disposable();
    }
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn create_rejects_negative() {
        assert!(Semaphore::new(-1).is_none());
    }

    #[test]
    fn signal_wait_roundtrip_leaves_value_unchanged() {
        let sem = Semaphore::new(0).unwrap();
        sem.signal();
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);
    }

    #[test]
    fn wait_immediate_on_empty_times_out_and_restores_value() {
        let sem = Semaphore::new(0).unwrap();
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::TimedOut);
        // Restored: a subsequent signal+wait still succeeds without double-counting.
        sem.signal();
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);
    }

    #[test]
    fn bounded_resource_scenario() {
        let sem = Arc::new(Semaphore::new(2).unwrap());
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);

        let sem2 = Arc::clone(&sem);
        let timed_out = thread::spawn(move || {
            sem2.wait(Deadline::after(Duration::from_millis(80)))
        })
        .join()
        .unwrap();
        assert_eq!(timed_out, WaitResult::TimedOut);

        sem.signal();
        assert_eq!(sem.wait(Deadline::after(Duration::from_secs(1))), WaitResult::Signaled);
    }

    #[test]
    fn producer_consumer_scenario() {
        let sem = Arc::new(Semaphore::new(0).unwrap());

        let producers: Vec<_> = (0..10)
            .map(|_| {
                let sem = Arc::clone(&sem);
                thread::spawn(move || sem.signal())
            })
            .collect();

        let consumers: Vec<_> = (0..10)
            .map(|_| {
                let sem = Arc::clone(&sem);
                thread::spawn(move || sem.wait(Deadline::Forever))
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        for c in consumers {
            assert_eq!(c.join().unwrap(), WaitResult::Signaled);
        }

        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::TimedOut);
        sem.signal();
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);
    }

    #[test]
    fn dispose_on_balanced_semaphore_succeeds() {
        let sem = Semaphore::new(3).unwrap();
        sem.signal();
        assert_eq!(sem.wait(Deadline::Immediate), WaitResult::Signaled);
        sem.dispose();
    }
}
