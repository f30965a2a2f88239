use std::cell::Cell;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of identities. Starts at 1 so that 0 stays free as the
/// "no owner" sentinel inside the lock state.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Identity of the OS thread, allocated on first use.
    static THREAD_ID: Cell<Option<OwnerId>> = const { Cell::new(None) };

    /// Logical context installed by [`with_owner`], if any.
    static CURRENT_OWNER: Cell<Option<OwnerId>> = const { Cell::new(None) };
}

/// Identity of an execution context that can own a reentrant lock.
///
/// By default every OS thread gets its own identity. Code that multiplexes
/// several logical tasks onto one thread can allocate identities with
/// [`OwnerId::fresh`] and install them with [`with_owner`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(NonZeroU64);

impl OwnerId {
    /// Returns the identity of the calling context.
    ///
    /// An identity installed by [`with_owner`] takes precedence over the
    /// thread's own identity.
    pub fn current() -> OwnerId {
        CURRENT_OWNER
            .with(Cell::get)
            .unwrap_or_else(OwnerId::current_thread)
    }

    /// Identity of the calling OS thread, ignoring any [`with_owner`] override.
    pub(crate) fn current_thread() -> OwnerId {
        THREAD_ID.with(|cell| match cell.get() {
            Some(id) => id,
            None => {
                let id = OwnerId::fresh();
                cell.set(Some(id));
                id
            }
        })
    }

    /// Allocates a new identity, distinct from every other one handed out
    /// in this process.
    ///
    /// # Panics
    ///
    /// Panics if the identity space is exhausted.
    pub fn fresh() -> OwnerId {
        next_id(&NEXT_ID)
    }

    /// Returns the raw numeric value of this identity. Never zero.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn from_raw(raw: u64) -> Option<OwnerId> {
        NonZeroU64::new(raw).map(OwnerId)
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Draws the next identity from `counter`, refusing to wrap around.
fn next_id(counter: &AtomicU64) -> OwnerId {
    let raw = counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
        .ok()
        .and_then(NonZeroU64::new);

    match raw {
        Some(raw) => OwnerId(raw),
        None => panic!("remutex: owner identity space exhausted"),
    }
}

/// Who holds a lock: the logical owner plus the OS thread it acquired on.
///
/// Reentrancy requires both to match, so two threads sharing one logical
/// owner through [`with_owner`] still exclude each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Holder {
    pub(crate) owner: OwnerId,
    pub(crate) thread: OwnerId,
}

impl Holder {
    pub(crate) fn current() -> Holder {
        Holder {
            owner: OwnerId::current(),
            thread: OwnerId::current_thread(),
        }
    }
}

/// Runs `f` with `owner` as the identity of the calling context.
///
/// Locks acquired inside `f` are keyed on `owner` in addition to the current
/// thread: a different logical owner on the same thread is excluded, and the
/// same logical owner on another thread is excluded too. The previous
/// identity is restored when `f` returns or unwinds.
///
/// # Examples
///
/// ```rust
/// use remutex::{OwnerId, ReentrantLock, with_owner};
///
/// let lock = ReentrantLock::new();
/// let task = OwnerId::fresh();
///
/// with_owner(task, || {
///     lock.acquire();
///     assert_eq!(lock.owner(), Some(task));
///     lock.release();
/// });
/// ```
pub fn with_owner<R>(owner: OwnerId, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<OwnerId>);

    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_OWNER.with(|cell| cell.set(self.0));
        }
    }

    let _restore = Restore(CURRENT_OWNER.with(|cell| cell.replace(Some(owner))));

    f()
}
