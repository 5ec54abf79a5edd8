//!Per-thread free list of kernel semaphores (§4.3 / the "thread-cached semaphore"
//!collaborator [`crate::once`] uses for its waiter nodes).
//!
//!Allocating a kernel semaphore is comparatively expensive (a syscall on every
//!backend); a thread that repeatedly loses the race to become a [`crate::once::Once`]
//!leader would otherwise pay that cost on every contended call. Caching one per thread
//!amortizes it across calls.

use std::cell::RefCell;

use crate::sys::KernelSem;

thread_local! {
    static FREE_LIST: RefCell<Vec<Box<KernelSem>>> = RefCell::new(Vec::new());
}

///A kernel semaphore borrowed from the calling thread's cache.
///
///Returned to the cache on drop. Because the handle is reused across calls, it is
///always left in the "no pending signal" state by the time it's checked back in -
///callers must fully drain any signal they expect before dropping this guard.
pub(crate) struct CachedSem(Option<Box<KernelSem>>);

///Borrows (or lazily creates) a kernel semaphore for the calling thread.
pub(crate) fn acquire() -> CachedSem {
    let sem = FREE_LIST.with(|list| list.borrow_mut().pop());
    let sem = sem.unwrap_or_else(|| {
        let sem = Box::new(KernelSem::new());
        sem.ensure();
        sem
    });
    CachedSem(Some(sem))
}

impl CachedSem {
    ///Blocks the calling thread until another thread calls [`CachedSem::signal_raw`] on
    ///the raw handle returned by [`CachedSem::raw`].
    pub(crate) fn wait(&self) {
        self.0.as_ref().expect("cached sem taken").wait_forever();
    }

    ///A raw pointer to the underlying kernel semaphore, valid for as long as this guard
    ///is alive. [`crate::once::Waiter`] stores this pointer so the leader thread can
    ///signal a waiter it never otherwise has a reference to.
    pub(crate) fn raw(&self) -> *const KernelSem {
        &**self.0.as_ref().expect("cached sem taken") as *const KernelSem
    }

    ///Signals a kernel semaphore through a raw pointer obtained from [`CachedSem::raw`].
    ///
    ///# Safety
    ///The pointee must still be alive - i.e. the thread that produced it via
    ///[`CachedSem::raw`] must not yet have returned from the wait it is about to be
    ///signaled out of.
    pub(crate) unsafe fn signal_raw(sem: *const KernelSem) {
        (*sem).signal();
    }
}

impl Drop for CachedSem {
    fn drop(&mut self) {
        if let Some(sem) = self.0.take() {
            FREE_LIST.with(|list| list.borrow_mut().push(sem));
        }
    }
}
