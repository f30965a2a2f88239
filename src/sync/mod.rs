//! Reentrant synchronization primitives.
//!
//! The primitives in this module block OS threads; they are meant for call
//! graphs where a thread may re-enter a critical section it already holds.
//!
//! - [`ReentrantLock`] — a bare reentrant lock with explicit acquire/release.
//! - [`ReentrantMutex`] — a reentrant lock bundled with the value it guards.
//! - [`OwnerId`] and [`with_owner`] — the identity that reentrancy is keyed on.
//!
//! ## Design notes
//!
//! - Bookkeeping (nesting depth and owner) lives behind a small internal
//!   gate; contended acquirers park on a condition variable paired with it.
//! - Every release that frees the lock wakes one parked acquirer, which
//!   re-checks ownership before proceeding. There is no FIFO ordering.
//! - Releasing a level that the caller does not hold is a contract
//!   violation and panics.

mod mutex;
mod owner;
mod reentrant;

pub use mutex::{ReentrantMutex, ReentrantMutexGuard};
pub use owner::{OwnerId, with_owner};
pub use reentrant::{ReentrantLock, ReentrantLockGuard};
