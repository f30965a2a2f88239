use super::owner::{Holder, OwnerId};
use crate::error::ReleaseError;

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::marker::PhantomData;
use std::thread;
use tracing::{error, trace};

/// A mutual exclusion lock that its owner may acquire repeatedly.
///
/// Each successful [`acquire`](Self::acquire) by the owning context adds one
/// nesting level, and each [`release`](Self::release) removes one. Other
/// contexts block in `acquire` until the depth drops back to zero.
///
/// Ownership is bound to the OS thread that acquired the lock. A logical
/// owner installed with [`with_owner`](super::with_owner) only re-enters on
/// that same thread.
///
/// The lock is not fair: a context arriving while waiters are parked may
/// take the lock ahead of them.
///
/// `ReentrantLock` is neither `Clone` nor `Copy`; share it by reference or
/// through an `Arc`.
///
/// # Examples
///
/// ```rust
/// use remutex::ReentrantLock;
///
/// static LOCK: ReentrantLock = ReentrantLock::new();
///
/// fn outer() {
///     LOCK.acquire();
///     inner();
///     LOCK.release();
/// }
///
/// fn inner() {
///     LOCK.acquire();
///     assert_eq!(LOCK.depth(), 2);
///     LOCK.release();
/// }
///
/// outer();
/// assert!(!LOCK.is_locked());
/// ```
pub struct ReentrantLock {
    /// Bookkeeping gate. Every read and write of [`State`] goes through it.
    gate: Mutex<State>,

    /// Wakes one parked acquirer when the depth reaches zero.
    ///
    /// Always waited on with `gate` held, so a release cannot slip between
    /// a waiter's check and its wait.
    signal: Condvar,
}

/// Ownership bookkeeping protected by the gate.
struct State {
    /// Number of unmatched acquisitions by `holder`. Zero means unheld.
    depth: usize,

    /// `Some` exactly while `depth > 0`.
    holder: Option<Holder>,
}

impl State {
    /// One acquisition attempt on behalf of `caller`.
    fn try_take(&mut self, caller: Holder) -> bool {
        if self.depth != 0 && self.holder != Some(caller) {
            return false;
        }

        self.holder = Some(caller);
        self.depth += 1;

        true
    }

    fn owner(&self) -> Option<OwnerId> {
        self.holder.map(|holder| holder.owner)
    }
}

impl ReentrantLock {
    /// Creates a new, unheld lock.
    pub const fn new() -> ReentrantLock {
        Self {
            gate: Mutex::new(State {
                depth: 0,
                holder: None,
            }),
            signal: Condvar::new(),
        }
    }

    /// Acquires the lock for the calling context, blocking while another
    /// context holds it.
    ///
    /// Returns immediately when the caller already owns the lock, adding
    /// one nesting level. There is no timeout; a holder that never releases
    /// blocks every other acquirer forever.
    pub fn acquire(&self) {
        self.acquire_as(Holder::current());
    }

    fn acquire_as(&self, caller: Holder) {
        let mut state = self.gate.lock();
        let mut waited = false;

        while !state.try_take(caller) {
            if !waited {
                trace!(
                    caller = %caller.owner,
                    holder = ?state.owner(),
                    "reentrant lock contended, waiting"
                );
                waited = true;
            }

            // Wakeups are advisory; the loop re-checks ownership.
            self.signal.wait(&mut state);
        }

        if waited {
            trace!(caller = %caller.owner, "reentrant lock acquired after wait");
        }
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `true` if the calling context now holds the lock (including
    /// the reentrant case), `false` if another context holds it.
    pub fn try_acquire(&self) -> bool {
        self.gate.lock().try_take(Holder::current())
    }

    /// Acquires the lock and returns a guard that releases one nesting
    /// level when dropped.
    pub fn lock(&self) -> ReentrantLockGuard<'_> {
        let caller = Holder::current();
        self.acquire_as(caller);

        ReentrantLockGuard::new(self, caller)
    }

    /// Attempts to acquire the lock without blocking, returning a guard on
    /// success.
    pub fn try_lock(&self) -> Option<ReentrantLockGuard<'_>> {
        let caller = Holder::current();

        self.gate
            .lock()
            .try_take(caller)
            .then(|| ReentrantLockGuard::new(self, caller))
    }

    /// Releases one nesting level held by the calling context.
    ///
    /// # Panics
    ///
    /// Panics with the [`ReleaseError`] message if the lock is not held, is
    /// held by a different owner, or was acquired on a different thread.
    /// All are violations of the acquire/release discipline.
    #[track_caller]
    pub fn release(&self) {
        if let Err(err) = self.try_release() {
            error!(error = %err, "reentrant lock released without being held");
            panic!("{err}");
        }
    }

    /// Releases one nesting level held by the calling context, reporting
    /// misuse as an error instead of panicking.
    ///
    /// On error the lock state is unchanged.
    pub fn try_release(&self) -> Result<(), ReleaseError> {
        self.release_as(Holder::current())
    }

    fn release_as(&self, caller: Holder) -> Result<(), ReleaseError> {
        let mut state = self.gate.lock();

        let holder = match state.holder {
            Some(holder) if state.depth > 0 => holder,
            _ => return Err(ReleaseError::NotLocked),
        };

        if holder.owner != caller.owner {
            return Err(ReleaseError::NotOwner {
                owner: holder.owner,
                caller: caller.owner,
            });
        }

        if holder.thread != caller.thread {
            return Err(ReleaseError::WrongThread {
                owner: holder.owner,
            });
        }

        state.depth -= 1;

        if state.depth > 0 {
            return Ok(());
        }

        state.holder = None;
        drop(state);

        trace!(caller = %caller.owner, "reentrant lock fully released");
        self.signal.notify_one();

        Ok(())
    }

    /// Returns the current nesting depth. Zero means the lock is free.
    pub fn depth(&self) -> usize {
        self.gate.lock().depth
    }

    /// Returns `true` if some context holds the lock.
    pub fn is_locked(&self) -> bool {
        self.depth() > 0
    }

    /// Returns `true` if the calling context holds the lock on this thread.
    pub fn is_held_by_current(&self) -> bool {
        self.gate.lock().holder == Some(Holder::current())
    }

    /// Returns the identity of the current holder, if any.
    pub fn owner(&self) -> Option<OwnerId> {
        self.gate.lock().owner()
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.gate.lock();

        f.debug_struct("ReentrantLock")
            .field("depth", &state.depth)
            .field("owner", &state.owner())
            .finish()
    }
}

/// Guard returned by [`ReentrantLock::lock`].
///
/// Releases one nesting level when dropped. The guard stays on the thread
/// that created it.
///
/// # Panics
///
/// Dropping the guard panics if its nesting level was already given back
/// through a raw [`ReentrantLock::release`], unless the thread is already
/// unwinding.
#[must_use = "if unused the lock is released immediately"]
pub struct ReentrantLockGuard<'a> {
    lock: &'a ReentrantLock,

    /// Holder the nesting level was taken for. Releasing with it keeps the
    /// guard correct even if [`with_owner`](super::with_owner) changed the
    /// ambient identity in between.
    holder: Holder,

    _not_send: PhantomData<*const ()>,
}

impl<'a> ReentrantLockGuard<'a> {
    fn new(lock: &'a ReentrantLock, holder: Holder) -> Self {
        Self {
            lock,
            holder,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ReentrantLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release_as(self.holder) {
            error!(error = %err, "reentrant lock guard dropped without a held level");

            if !thread::panicking() {
                panic!("{err}");
            }
        }
    }
}

impl fmt::Debug for ReentrantLockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLockGuard")
            .field("owner", &self.holder.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn new_lock_is_unheld() {
        let lock = ReentrantLock::new();

        assert_eq!(lock.depth(), 0);
        assert_eq!(lock.owner(), None);
        assert!(!lock.is_locked());
    }

    #[test]
    fn default_matches_new() {
        let lock = ReentrantLock::default();

        assert_eq!(lock.depth(), 0);
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn reacquire_increments_depth() {
        let lock = ReentrantLock::new();

        for n in 1..=5 {
            lock.acquire();
            assert_eq!(lock.depth(), n);
        }

        assert_eq!(lock.owner(), Some(OwnerId::current()));

        for n in (0..5).rev() {
            lock.release();
            assert_eq!(lock.depth(), n);
        }

        assert_eq!(lock.owner(), None);
    }

    #[test]
    fn over_release_is_rejected_and_leaves_state() {
        let lock = ReentrantLock::new();

        lock.acquire();
        assert_eq!(lock.try_release(), Ok(()));
        assert_eq!(lock.try_release(), Err(ReleaseError::NotLocked));
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "remutex: unlock of unlocked mutex")]
    fn release_of_fresh_lock_panics() {
        ReentrantLock::new().release();
    }

    #[test]
    fn release_from_other_thread_is_rejected() {
        let lock = Arc::new(ReentrantLock::new());
        lock.acquire();

        let owner = OwnerId::current();
        let remote = lock.clone();
        let result = thread::spawn(move || remote.try_release()).join().unwrap();

        assert!(matches!(
            result,
            Err(ReleaseError::NotOwner { owner: o, .. }) if o == owner
        ));
        assert_eq!(lock.depth(), 1);

        lock.release();
    }

    #[test]
    fn try_acquire_fails_while_other_thread_holds() {
        let lock = Arc::new(ReentrantLock::new());
        lock.acquire();

        let remote = lock.clone();
        let acquired = thread::spawn(move || remote.try_acquire()).join().unwrap();

        assert!(!acquired);
        assert_eq!(lock.depth(), 1);

        lock.release();
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = ReentrantLock::new();

        {
            let _outer = lock.lock();
            let _inner = lock.lock();
            assert_eq!(lock.depth(), 2);
        }

        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_guard_is_none_when_contended() {
        let lock = Arc::new(ReentrantLock::new());
        let (held_tx, held_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let remote = lock.clone();
        let holder = thread::spawn(move || {
            let _guard = remote.lock();
            held_tx.send(()).unwrap();
            done_rx.recv().unwrap();
        });

        held_rx.recv().unwrap();
        assert!(lock.try_lock().is_none());

        done_tx.send(()).unwrap();
        holder.join().unwrap();

        assert!(lock.try_lock().is_some());
        assert!(!lock.is_locked());
    }

    #[test]
    fn waiter_wakes_after_final_release() {
        let lock = Arc::new(ReentrantLock::new());
        lock.acquire();
        lock.acquire();

        let remote = lock.clone();
        let waiter = thread::spawn(move || {
            remote.acquire();
            let owner = remote.owner();
            remote.release();
            owner
        });

        thread::sleep(Duration::from_millis(20));
        lock.release();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(lock.owner(), Some(OwnerId::current()));

        lock.release();

        let waiter_owner = waiter.join().unwrap();
        assert!(waiter_owner.is_some());
        assert_ne!(waiter_owner, Some(OwnerId::current()));
    }

    #[test]
    fn debug_shows_depth() {
        let lock = ReentrantLock::new();
        let _guard = lock.lock();

        let text = format!("{lock:?}");
        assert!(text.contains("depth: 1"), "{text}");
    }

    #[test]
    #[should_panic(expected = "unlock of unlocked mutex")]
    fn guard_drop_after_raw_release_panics() {
        let lock = ReentrantLock::new();
        let guard = lock.lock();

        lock.release();
        drop(guard);
    }

    #[test]
    fn guard_drop_while_unwinding_does_not_double_panic() {
        let lock = ReentrantLock::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.lock();
            lock.release();
            panic!("first");
        }));

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"first"));
        assert!(!lock.is_locked());
    }
}
