//!macOS/iOS kernel-semaphore backend, built on the Mach `semaphore_*` API.
//!
//!The handle is allocated lazily behind an `AtomicPtr`, installed with a
//!CAS-install-or-discard pattern, and retried on transient `KERN_RESOURCE_SHORTAGE`.

use core::convert::TryFrom;
use core::ffi::c_void;
use core::mem;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use std::time::Duration;

#[repr(C)]
struct MachTimeSpec {
    tv_sec: libc::c_uint,
    tv_nsec: libc::c_int,
}

impl From<Duration> for MachTimeSpec {
    fn from(d: Duration) -> Self {
        MachTimeSpec {
            tv_sec: libc::c_uint::try_from(d.as_secs()).unwrap_or(libc::c_uint::max_value()),
            tv_nsec: libc::c_int::try_from(d.subsec_nanos()).unwrap_or(libc::c_int::max_value()),
        }
    }
}

const KERN_SUCCESS: libc::c_int = 0;
const KERN_ABORTED: libc::c_int = 14;
const KERN_OPERATION_TIMED_OUT: libc::c_int = 49;
const KERN_RESOURCE_SHORTAGE: libc::c_int = 6;
const SYNC_POLICY_FIFO: libc::c_int = 0;

extern "C" {
    static mach_task_self_: libc::c_uint;

    fn semaphore_create(
        task: libc::c_uint,
        semaphore: *mut *mut c_void,
        policy: libc::c_int,
        value: libc::c_int,
    ) -> libc::c_int;
    fn semaphore_signal(semaphore: *mut c_void) -> libc::c_int;
    fn semaphore_wait(semaphore: *mut c_void) -> libc::c_int;
    fn semaphore_timedwait(semaphore: *mut c_void, timeout: MachTimeSpec) -> libc::c_int;
    fn semaphore_destroy(task: libc::c_uint, semaphore: *mut c_void) -> libc::c_int;
}

pub(crate) struct KernelSem {
    handle: AtomicPtr<c_void>,
}

impl KernelSem {
    pub(crate) const fn new() -> Self {
        Self {
            handle: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn ensure(&self) {
        if !self.handle.load(Ordering::Acquire).is_null() {
            return;
        }

        loop {
            let mut tmp = mem::MaybeUninit::uninit();
            let kr =
                unsafe { semaphore_create(mach_task_self_, tmp.as_mut_ptr(), SYNC_POLICY_FIFO, 0) };

            if kr == KERN_SUCCESS {
                let tmp = unsafe { tmp.assume_init() };
                if self
                    .handle
                    .compare_exchange(ptr::null_mut(), tmp, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    unsafe {
                        semaphore_destroy(mach_task_self_, tmp);
                    }
                }
                return;
            }

            debug_assert_eq!(kr, KERN_RESOURCE_SHORTAGE, "semaphore_create failed: {}", kr);
        }
    }

    fn handle(&self) -> *mut c_void {
        let handle = self.handle.load(Ordering::Acquire);
        debug_assert!(!handle.is_null(), "kernel semaphore used before ensure()");
        handle
    }

    pub(crate) fn signal(&self) {
        let kr = unsafe { semaphore_signal(self.handle()) };
        debug_assert_eq!(kr, KERN_SUCCESS, "semaphore_signal failed: {}", kr);
    }

    pub(crate) fn wait_forever(&self) {
        loop {
            let kr = unsafe { semaphore_wait(self.handle()) };
            if kr != KERN_ABORTED {
                debug_assert_eq!(kr, KERN_SUCCESS, "semaphore_wait failed: {}", kr);
                return;
            }
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        loop {
            let kr = unsafe { semaphore_timedwait(self.handle(), timeout.into()) };
            if kr == KERN_ABORTED {
                continue;
            }
            if kr == KERN_OPERATION_TIMED_OUT {
                return false;
            }
            debug_assert_eq!(kr, KERN_SUCCESS, "semaphore_timedwait failed: {}", kr);
            return true;
        }
    }
}

impl Drop for KernelSem {
    fn drop(&mut self) {
        let handle = self.handle.swap(ptr::null_mut(), Ordering::AcqRel);
        if !handle.is_null() {
            unsafe {
                semaphore_destroy(mach_task_self_, handle);
            }
        }
    }
}

unsafe impl Send for KernelSem {}
unsafe impl Sync for KernelSem {}
