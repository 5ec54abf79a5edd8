//!The task group (§5): tracks outstanding work and notifies a collaborator once the
//!count returns to zero.
//!
//!Represented internally the same way [`crate::semaphore::Semaphore`] is - a counting
//!semaphore whose initial value is `isize::MAX` - so `enter`/`leave` are a `Semaphore`'s
//!`wait`/`signal` under different names, and "empty" is "back at the original value"
//!rather than zero.

use core::ptr;
use core::sync::atomic::{AtomicIsize, AtomicPtr, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::atomic::hardware_pause;
use crate::deadline::{Deadline, WaitResult};
use crate::error::fatal;
use crate::sys::KernelSem;

///A destination a completion job can be run on.
///
///Implement this to run group-completion callbacks somewhere other than inline on the
///thread that happened to call the last `leave`.
pub trait Queue: Send + Sync {
    fn enqueue(&self, job: Box<dyn FnOnce() + Send>);
}

///Runs the job synchronously, on whichever thread drains the notification list.
pub struct InlineQueue;

impl Queue for InlineQueue {
    fn enqueue(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

///Spawns a fresh `std::thread` per job.
pub struct ThreadQueue;

impl Queue for ThreadQueue {
    fn enqueue(&self, job: Box<dyn FnOnce() + Send>) {
        thread::spawn(job);
    }
}

struct NotifyNode {
    next: AtomicPtr<NotifyNode>,
    queue: Box<dyn Queue>,
    job: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

///A group of outstanding work items; waits or runs a callback once they've all
///completed.
pub struct Group {
    value: AtomicIsize,
    kernel: KernelSem,
    group_waiters: AtomicUsize,
    notify_head: AtomicPtr<NotifyNode>,
    notify_tail: AtomicPtr<NotifyNode>,
}

const EMPTY: isize = isize::MAX;

impl Group {
    ///Creates an empty group.
    pub fn new() -> Self {
        Self {
            value: AtomicIsize::new(EMPTY),
            kernel: KernelSem::new(),
            group_waiters: AtomicUsize::new(0),
            notify_head: AtomicPtr::new(ptr::null_mut()),
            notify_tail: AtomicPtr::new(ptr::null_mut()),
        }
    }

    ///Marks one unit of work as outstanding.
    pub fn enter(&self) {
        let post = self.value.fetch_sub(1, Ordering::Acquire).wrapping_sub(1);
        if post < 0 {
            fatal("Group::enter overflowed - too many outstanding entries");
        }
    }

    ///Marks one unit of work as completed.
    ///
    ///Waking waiters and running queued notifications happens here, on whichever
    ///thread's `leave` brings the count back to empty.
    pub fn leave(&self) {
        let post = self.value.fetch_add(1, Ordering::Release).wrapping_add(1);
        if post == isize::MIN {
            fatal("Group::leave called without matching Group::enter");
        }
        if post == EMPTY {
            self.wake();
        }
    }

    ///Blocks until the group is empty, or `deadline` elapses.
    pub fn wait(&self, deadline: Deadline) -> WaitResult {
        if self.value.load(Ordering::Acquire) == EMPTY {
            return WaitResult::Signaled;
        }
        if let Deadline::Immediate = deadline {
            return WaitResult::TimedOut;
        }
        self.wait_slow(deadline)
    }

    #[cold]
    fn wait_slow(&self, deadline: Deadline) -> WaitResult {
        loop {
            if self.value.load(Ordering::Acquire) == EMPTY {
                return WaitResult::Signaled;
            }

            self.group_waiters.fetch_add(1, Ordering::Relaxed);

            if self.value.load(Ordering::Acquire) == EMPTY {
                self.wake();
                return WaitResult::Signaled;
            }

            self.kernel.ensure();

            let timed_out = match deadline {
                Deadline::Immediate => unreachable!("handled by wait() fast path"),
                Deadline::Forever => {
                    self.kernel.wait_forever();
                    false
                }
                Deadline::At(at) => {
                    let now = std::time::Instant::now();
                    if now >= at {
                        true
                    } else {
                        !self.kernel.wait_timeout(at - now)
                    }
                }
            };

            if timed_out {
                if self.try_undo_waiter_registration() {
                    return WaitResult::TimedOut;
                }
                // Lost the race: `wake()` already claimed our registration and sent (or
                // is sending) a real kernel signal on our behalf. Block for it instead
                // of reporting a spurious timeout.
                self.kernel.wait_forever();
            }

            if self.value.load(Ordering::Acquire) == EMPTY {
                return WaitResult::Signaled;
            }
        }
    }

    ///Tries to undo this waiter's registration via CAS while `group_waiters` still
    ///counts it. Returns `false` if `wake()` already consumed it - the caller must then
    ///block for the kernel signal `wake()` sent on its behalf rather than treat the race
    ///as a timeout.
    fn try_undo_waiter_registration(&self) -> bool {
        loop {
            let orig = self.group_waiters.load(Ordering::Relaxed);
            if orig == 0 {
                return false;
            }
            if self
                .group_waiters
                .compare_exchange_weak(orig, orig - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    ///Runs `job` on `queue` once the group next becomes empty. If the group is already
    ///empty, the job may run before this call returns.
    pub fn notify(&self, queue: Box<dyn Queue>, job: Box<dyn FnOnce() + Send>) {
        let node = Box::into_raw(Box::new(NotifyNode {
            next: AtomicPtr::new(ptr::null_mut()),
            queue,
            job: Mutex::new(Some(job)),
        }));

        let prev = self.notify_tail.swap(node, Ordering::Release);
        if prev.is_null() {
            self.notify_head.store(node, Ordering::SeqCst);
        } else {
            unsafe {
                (*prev).next.store(node, Ordering::Release);
            }
        }

        core::sync::atomic::fence(Ordering::SeqCst);
        if self.value.load(Ordering::SeqCst) == EMPTY {
            self.wake();
        }
    }

    #[cold]
    fn wake(&self) {
        let head = self.notify_head.swap(ptr::null_mut(), Ordering::AcqRel);
        let tail = self.notify_tail.swap(ptr::null_mut(), Ordering::AcqRel);

        let waiters = self.group_waiters.swap(0, Ordering::AcqRel);
        if waiters > 0 {
            self.kernel.ensure();
            for _ in 0..waiters {
                self.kernel.signal();
            }
        }

        let mut cursor = head;
        while !cursor.is_null() {
            // `cursor == tail` means this is the last node captured by the swaps above;
            // anything else must have its `next` link published already or a concurrent
            // `notify` is still in the process of publishing it, so spin rather than
            // treat a transiently-null pointer as end of list.
            let next = if cursor == tail {
                ptr::null_mut()
            } else {
                loop {
                    let next = unsafe { (*cursor).next.load(Ordering::Acquire) };
                    if !next.is_null() {
                        break next;
                    }
                    hardware_pause();
                }
            };

            let node = unsafe { Box::from_raw(cursor) };
            let job = node.job.lock().unwrap().take();
            if let Some(job) = job {
                node.queue.enqueue(job);
            }

            cursor = next;
        }
    }

    fn check_disposable(&self) {
        if self.value.load(Ordering::Acquire) != EMPTY {
            fatal("group destroyed while entries were still outstanding");
        }
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        self.check_disposable();
    }
}

unsafe impl Send for Group {}
unsafe impl Sync for Group {}
