//! Error types for lock release.
//!
//! Acquisition never fails; the only contract violations are on the
//! release side, where a caller gives back a nesting level it does not hold.

use crate::sync::OwnerId;

use thiserror::Error;

/// Error returned by [`ReentrantLock::try_release`](crate::ReentrantLock::try_release).
///
/// Every variant is a programming error. [`ReentrantLock::release`](crate::ReentrantLock::release)
/// turns them into a panic; the lock state is left untouched either way.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    /// Release was called while no nesting level was held.
    #[error("remutex: unlock of unlocked mutex")]
    NotLocked,

    /// Release was called from a context other than the current owner.
    #[error("remutex: unlock by {caller}, but the mutex is owned by {owner}")]
    NotOwner {
        /// Identity currently holding the lock.
        owner: OwnerId,
        /// Identity that attempted the release.
        caller: OwnerId,
    },

    /// Release was called by the owning identity, but from a thread other
    /// than the one that acquired the lock.
    #[error("remutex: unlock of mutex held by {owner} from a thread that did not lock it")]
    WrongThread {
        /// Identity currently holding the lock.
        owner: OwnerId,
    },
}
