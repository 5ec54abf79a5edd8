//!The one-shot initializer (§6): runs a closure exactly once across any number of
//!racing callers, blocking the rest until it finishes.
//!
//!The already-done path is a single pointer load compared against a sentinel - no
//!atomic RMW, no kernel call. A contended caller either becomes the leader (first to
//!CAS the state from unlocked to locked) or links itself onto an intrusive stack rooted
//!at that same word, then blocks on a thread-cached kernel semaphore until the leader
//!wakes it.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::atomic::{hardware_pause, maximally_synchronizing_barrier};
use crate::cache::{self, CachedSem};
use crate::sys::KernelSem;

fn locked_sentinel() -> *mut Waiter {
    static LOCKED: u8 = 0;
    &LOCKED as *const u8 as *mut Waiter
}

fn done_sentinel() -> *mut Waiter {
    static DONE: u8 = 0;
    &DONE as *const u8 as *mut Waiter
}

struct Waiter {
    next: AtomicPtr<Waiter>,
    sema: *const KernelSem,
}

///A one-shot initializer: the first thread to call [`Once::call`] runs the closure, and
///every thread's call (including the leader's own) returns only after it has finished.
pub struct Once {
    state: AtomicPtr<Waiter>,
}

impl Once {
    ///Creates an initializer that has not yet run.
    pub const fn new() -> Self {
        Self {
            state: AtomicPtr::new(ptr::null_mut()),
        }
    }

    ///Returns `true` if the closure has already run to completion.
    ///
    ///Wait-free: the same single load-and-compare the fast path of [`Once::call`] does.
    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == done_sentinel()
    }

    ///Runs `f` if no prior call has completed (or is in flight); otherwise blocks until
    ///whichever call is in flight finishes, then returns without running `f` again.
    pub fn call(&self, f: impl FnOnce()) {
        if self.is_completed() {
            return;
        }
        self.call_slow(f);
    }

    #[cold]
    fn call_slow(&self, f: impl FnOnce()) {
        match self.state.compare_exchange(
            ptr::null_mut(),
            locked_sentinel(),
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                f();
                self.finish();
            }
            Err(observed) if observed == done_sentinel() => {}
            Err(_) => self.wait_as_waiter(),
        }
    }

    fn wait_as_waiter(&self) {
        let cached = cache::acquire();
        let waiter = Waiter {
            next: AtomicPtr::new(ptr::null_mut()),
            sema: cached.raw(),
        };
        let waiter_ptr = &waiter as *const Waiter as *mut Waiter;

        loop {
            let head = self.state.load(Ordering::Acquire);
            if head == done_sentinel() {
                return;
            }

            if self
                .state
                .compare_exchange_weak(head, waiter_ptr, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // Published as the new head before `next` is set - `finish`'s walk
                // spins on this window rather than treating a transiently-null `next`
                // as the end of the stack.
                waiter.next.store(head, Ordering::Release);
                break;
            }
        }

        cached.wait();
    }

    ///Runs on the leader once the closure has finished: publishes completion and wakes
    ///every waiter linked onto the stack up to that point.
    fn finish(&self) {
        maximally_synchronizing_barrier();
        let head = self.state.swap(done_sentinel(), Ordering::AcqRel);

        let mut cursor = head;
        while cursor != locked_sentinel() {
            debug_assert!(!cursor.is_null(), "waiter stack corrupted");
            let waiter = unsafe { &*cursor };

            // A waiter publishes itself as head before storing its own `next`; spin
            // until that store becomes visible rather than treating a transiently-null
            // pointer as the end of the stack.
            let next = loop {
                let next = waiter.next.load(Ordering::Acquire);
                if !next.is_null() {
                    break next;
                }
                hardware_pause();
            };

            unsafe {
                CachedSem::signal_raw(waiter.sema);
            }
            cursor = next;
        }
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for Once {}
unsafe impl Sync for Once {}
