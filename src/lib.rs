//! # remutex
//!
//! **remutex** provides a reentrant mutual-exclusion lock: a lock that the
//! thread holding it may acquire again without deadlocking, while every other
//! thread is still kept out until all nesting levels are released.
//!
//! It is a drop-in replacement for a plain mutex in call graphs that re-enter
//! a critical section, such as recursive functions or helpers that take the
//! same lock as their caller.
//!
//! - [`ReentrantLock`] tracks a nesting depth per owner and exposes explicit
//!   `acquire`/`release` as well as an RAII guard
//! - [`ReentrantMutex`] bundles the lock with the value it protects
//! - [`OwnerId`] and [`with_owner`] decide *who* the owner is, so runtimes
//!   that multiplex tasks onto threads can key reentrancy on the task
//!
//! The lock is not fair, not a reader/writer lock, and has no timeout.
//!
//! ## Quick Start
//!
//! ```rust
//! use remutex::ReentrantLock;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let lock = Arc::new(ReentrantLock::new());
//!
//! lock.acquire();
//! lock.acquire(); // same thread, does not block
//!
//! let other = lock.clone();
//! let handle = thread::spawn(move || {
//!     let _guard = other.lock(); // waits for both releases
//!     other.depth()
//! });
//!
//! lock.release();
//! lock.release();
//!
//! assert_eq!(handle.join().unwrap(), 1);
//! ```
//!
//! ## Logging
//!
//! Contention and misuse are reported through [`tracing`] events. No
//! subscriber is installed by this crate.

mod error;

pub mod sync;

pub use error::ReleaseError;
pub use sync::{
    OwnerId, ReentrantLock, ReentrantLockGuard, ReentrantMutex, ReentrantMutexGuard, with_owner,
};
