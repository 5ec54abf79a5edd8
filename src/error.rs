//!Fatal-abort contract for programmer misuse.
//!
//!Every path in [`crate::semaphore`], [`crate::group`] and [`crate::once`] that detects
//!corrupted shared state (an unbalanced `signal`/`leave`, a destroy-while-in-use, ...)
//!routes through [`fatal`]. There is no recovery: the state is already wrong, so the
//!only sound action is to log a diagnostic and take the process down before it does
//!more damage.

///Logs `message` and aborts the process.
///
///Never returns. Used for conditions that indicate the caller violated the contract of
///a synchronization primitive (double `leave`, signalling past `isize::MIN`, disposing
///a semaphore that still has outstanding waiters, ...).
#[cold]
#[inline(never)]
pub(crate) fn fatal(message: &str) -> ! {
    log::error!("taskwait: fatal: {}", message);
    std::process::abort()
}
