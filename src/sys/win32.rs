//!Windows kernel-semaphore backend, built on `CreateSemaphoreW`/`WaitForSingleObject`.
//!
//!Same lazy CAS-install-or-discard allocation scheme as the other backends.

use core::convert::TryInto;
use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use std::time::Duration;

const WAIT_OBJECT_0: u32 = 0;
const WAIT_TIMEOUT: u32 = 0x0000_0102;
const INFINITE: u32 = 0xFFFF_FFFF;

extern "system" {
    fn CloseHandle(handle: *mut c_void) -> i32;
    fn CreateSemaphoreW(
        attrs: *mut c_void,
        initial: i32,
        max: i32,
        name: *const u16,
    ) -> *mut c_void;
    fn WaitForSingleObject(handle: *mut c_void, timeout_ms: u32) -> u32;
    fn ReleaseSemaphore(handle: *mut c_void, increment: i32, previous: *mut i32) -> i32;
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
            let tmp = unsafe { CreateSemaphoreW(ptr::null_mut(), 0, i32::max_value(), ptr::null()) };
            if !tmp.is_null() {
                if self
                    .handle
                    .compare_exchange(ptr::null_mut(), tmp, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    unsafe {
                        CloseHandle(tmp);
                    }
                }
                return;
            }
            // CreateSemaphoreW failing with a null handle is a transient resource
            // shortage on Windows (no distinct "would block" errno to check here);
            // retry as the contract requires.
        }
    }

    fn handle(&self) -> *mut c_void {
        let handle = self.handle.load(Ordering::Acquire);
        debug_assert!(!handle.is_null(), "kernel semaphore used before ensure()");
        handle
    }

    pub(crate) fn signal(&self) {
        let res = unsafe { ReleaseSemaphore(self.handle(), 1, ptr::null_mut()) };
        debug_assert_ne!(res, 0, "ReleaseSemaphore failed");
    }

    pub(crate) fn wait_forever(&self) {
        loop {
            let result = unsafe { WaitForSingleObject(self.handle(), INFINITE) };
            if result == WAIT_OBJECT_0 {
                return;
            }
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let millis = timeout.as_millis().try_into().unwrap_or(u32::max_value());
        let result = unsafe { WaitForSingleObject(self.handle(), millis) };
        match result {
            WAIT_OBJECT_0 => true,
            WAIT_TIMEOUT => false,
            other => {
                debug_assert!(false, "WaitForSingleObject failed: {}", other);
                false
            }
        }
    }
}

impl Drop for KernelSem {
    fn drop(&mut self) {
        let handle = self.handle.swap(ptr::null_mut(), Ordering::AcqRel);
        if !handle.is_null() {
            unsafe {
                CloseHandle(handle);
            }
        }
    }
}

unsafe impl Send for KernelSem {}
unsafe impl Sync for KernelSem {}
