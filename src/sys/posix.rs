//!POSIX kernel-semaphore backend, built on `sem_init`/`sem_post`/`sem_wait`/`sem_timedwait`.
//!
//!`wait_timeout`/`wait_forever` loop on `EINTR` internally - a signal interrupting the
//!wait is not surfaced to the caller.

use core::convert::TryFrom;
use core::mem;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use std::time::Duration;

use error_code::PosixError;

struct Handle(libc::sem_t);

///Lazily-allocated POSIX semaphore handle.
///
///Uses the same CAS-install-or-discard shape as the `mac`/`win32` backends rather than
///eagerly `sem_init`-ing at construction, so [`crate::semaphore::Semaphore`] and
///[`crate::group::Group`] can treat all three backends uniformly (see `ensure`).
pub(crate) struct KernelSem {
    handle: AtomicPtr<Handle>,
}

impl KernelSem {
    pub(crate) const fn new() -> Self {
        Self {
            handle: AtomicPtr::new(ptr::null_mut()),
        }
    }

    ///Idempotent lazy install. Retries on transient resource shortage (`EAGAIN`/`ENOMEM`).
    pub(crate) fn ensure(&self) {
        if !self.handle.load(Ordering::Acquire).is_null() {
            return;
        }

        loop {
            let mut sem = mem::MaybeUninit::<libc::sem_t>::uninit();
            let res = unsafe { libc::sem_init(sem.as_mut_ptr(), 0, 0) };

            if res == 0 {
                let boxed = Box::into_raw(Box::new(Handle(unsafe { sem.assume_init() })));
                match self.handle.compare_exchange(
                    ptr::null_mut(),
                    boxed,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return,
                    Err(_) => unsafe {
                        let mut lost = Box::from_raw(boxed);
                        libc::sem_destroy(&mut lost.0);
                        return;
                    },
                }
            }

            let errno = PosixError::last();
            if errno.raw_code() == libc::EINTR {
                continue;
            }
            debug_assert!(
                errno.raw_code() == libc::EAGAIN || errno.raw_code() == libc::ENOMEM,
                "unexpected sem_init failure: {:?}",
                errno
            );
        }
    }

    fn handle(&self) -> *mut libc::sem_t {
        let handle = self.handle.load(Ordering::Acquire);
        debug_assert!(!handle.is_null(), "kernel semaphore used before ensure()");
        unsafe { &mut (*handle).0 as *mut libc::sem_t }
    }

    pub(crate) fn signal(&self) {
        let res = unsafe { libc::sem_post(self.handle()) };
        debug_assert_eq!(res, 0, "sem_post failed: {:?}", PosixError::last());
    }

    pub(crate) fn wait_forever(&self) {
        loop {
            let res = unsafe { libc::sem_wait(self.handle()) };
            if res == 0 {
                return;
            }
            let errno = PosixError::last();
            debug_assert_eq!(errno.raw_code(), libc::EINTR, "unexpected sem_wait failure");
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        // sem_timedwait wants an absolute CLOCK_REALTIME deadline, not a relative one -
        // unlike Mach's semaphore_timedwait or Windows' WaitForSingleObject, both of
        // which are genuinely relative.
        let mut deadline = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let res = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) };
        debug_assert_eq!(res, 0, "clock_gettime failed: {:?}", PosixError::last());

        deadline.tv_sec = deadline
            .tv_sec
            .saturating_add(timeout.as_secs() as libc::time_t);
        #[cfg(target_pointer_width = "64")]
        let nanos = libc::c_long::from(timeout.subsec_nanos() as i32);
        #[cfg(not(target_pointer_width = "64"))]
        let nanos =
            libc::c_long::try_from(timeout.subsec_nanos()).unwrap_or(libc::c_long::max_value());

        deadline.tv_nsec += nanos;
        if deadline.tv_nsec >= 1_000_000_000 {
            deadline.tv_nsec -= 1_000_000_000;
            deadline.tv_sec = deadline.tv_sec.saturating_add(1);
        }

        loop {
            let res = unsafe { libc::sem_timedwait(self.handle(), &deadline) };
            if res == 0 {
                return true;
            }

            let errno = PosixError::last();
            if errno.raw_code() == libc::ETIMEDOUT {
                return false;
            }
            debug_assert_eq!(errno.raw_code(), libc::EINTR, "unexpected sem_timedwait failure");
        }
    }
}

impl Drop for KernelSem {
    fn drop(&mut self) {
        let handle = self.handle.swap(ptr::null_mut(), Ordering::AcqRel);
        if !handle.is_null() {
            unsafe {
                let mut boxed = Box::from_raw(handle);
                libc::sem_destroy(&mut boxed.0);
            }
        }
    }
}

unsafe impl Send for KernelSem {}
unsafe impl Sync for KernelSem {}
