//!Counting semaphore, task group, and one-shot initializer primitives.
//!
//!## Platform implementation
//!
//!#### Windows
//!
//!Kernel blocking uses `CreateSemaphoreW`/`WaitForSingleObject`.
//!
//!#### POSIX
//!
//!All POSIX-compliant systems use `sem_init`/`sem_post`/`sem_wait`/`sem_timedwait`, via
//![libc](https://github.com/rust-lang/libc). `wait_timeout` loops internally on `EINTR`.
//!
//!#### macOS / iOS
//!
//!Uses the Mach `semaphore_*` API.

#![warn(missing_docs)]

mod atomic;
mod cache;
mod deadline;
mod error;
mod group;
mod once;
mod semaphore;
mod sys;

pub use deadline::{Deadline, WaitResult};
pub use group::{Group, InlineQueue, Queue, ThreadQueue};
pub use once::Once;
pub use semaphore::Semaphore;
