//!The kernel-semaphore adapter (§4.2): one thin backend per platform OS primitive.
//!
//!Every backend exposes the same shape - `new`, `ensure`, `signal`, `wait_forever`,
//!`wait_timeout` - so [`crate::semaphore`], [`crate::group`] and [`crate::cache`] don't
//!need any `cfg` of their own; they just use `sys::KernelSem`.

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod mac;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) use mac::KernelSem;

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub(crate) use win32::KernelSem;

#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
mod posix;
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
pub(crate) use posix::KernelSem;
