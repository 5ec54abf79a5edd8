//!Atomic helpers shared by every primitive in this crate.
//!
//!The individual `load`/`store`/`compare_exchange`/`fetch_add` calls used by
//![`crate::semaphore`], [`crate::group`] and [`crate::once`] are plain
//![`core::sync::atomic`] methods called with an explicit [`Ordering`](core::sync::atomic::Ordering)
//!at each site - there is no generic wrapper for those. What's shared here is the two
//!primitives that are not already part of `core::sync::atomic`.

///A brief spin-wait hint for a thread that is busy-waiting on a predicate it expects to
///flip soon (e.g. a notify node's `next` pointer between CAS-publish and its follow-up
///store).
#[inline]
pub(crate) fn hardware_pause() {
    core::hint::spin_loop();
}

///A fence strong enough to defeat speculative read-ahead of a predicate word by peer
///processors, not just the relative ordering a plain `Release` store provides.
///
///On `x86`/`x86_64` this issues `CPUID`, a serializing instruction that flushes the
///pipeline; everywhere else it falls back to a `SeqCst` fence, the strongest ordering
///`core::sync::atomic` exposes. [`crate::once::Once`] relies on this running *after* the
///leader's closure completes and *before* the site is marked done, so that every other
///thread that later observes "done" with nothing more than a relaxed load also observes
///every write the closure made.
#[inline]
pub(crate) fn maximally_synchronizing_barrier() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::x86_64::__cpuid(0);
    }

    #[cfg(target_arch = "x86")]
    unsafe {
        core::arch::x86::__cpuid(0);
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}
