use super::reentrant::{ReentrantLock, ReentrantLockGuard};

use std::fmt;
use std::ops::Deref;

/// A reentrant mutex protecting a value.
///
/// `ReentrantMutex<T>` pairs a [`ReentrantLock`] with the data it guards.
/// The owning thread may hold several guards at once, so a guard only hands
/// out `&T`. Wrap the value in a `Cell` or `RefCell` to mutate it.
///
/// # Examples
///
/// ```rust
/// use remutex::ReentrantMutex;
/// use std::cell::RefCell;
///
/// let log = ReentrantMutex::new(RefCell::new(Vec::new()));
///
/// let outer = log.lock();
/// outer.borrow_mut().push("outer");
/// {
///     let inner = log.lock();
///     inner.borrow_mut().push("inner");
/// }
/// assert_eq!(*outer.borrow(), ["outer", "inner"]);
/// ```
pub struct ReentrantMutex<T> {
    /// Lock guarding `data`.
    raw: ReentrantLock,

    /// The protected value. Only reachable through a guard or `&mut self`.
    data: T,
}

// Safety: a nesting level is bound to the OS thread that took it, even when
// several threads share one logical owner, and guards are `!Send`. So `&T` is
// only ever observed from one thread at a time. Moving the value between
// owners needs `T: Send`.
unsafe impl<T: Send> Sync for ReentrantMutex<T> {}

impl<T> ReentrantMutex<T> {
    /// Creates a new, unlocked mutex wrapping `value`.
    pub const fn new(value: T) -> ReentrantMutex<T> {
        Self {
            raw: ReentrantLock::new(),
            data: value,
        }
    }

    /// Acquires the mutex, blocking while another thread holds it.
    ///
    /// Re-entering from the owning thread never blocks.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, T> {
        ReentrantMutexGuard {
            mutex: self,
            _guard: self.raw.lock(),
        }
    }

    /// Attempts to acquire the mutex without blocking.
    pub fn try_lock(&self) -> Option<ReentrantMutexGuard<'_, T>> {
        self.raw.try_lock().map(|guard| ReentrantMutexGuard {
            mutex: self,
            _guard: guard,
        })
    }

    /// Returns a mutable reference to the value. No locking is needed since
    /// the borrow is exclusive.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Consumes the mutex and returns the value.
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Returns the underlying lock, e.g. to inspect its depth.
    pub fn raw(&self) -> &ReentrantLock {
        &self.raw
    }
}

impl<T: Default> Default for ReentrantMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for ReentrantMutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for ReentrantMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ReentrantMutex");

        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };

        d.finish_non_exhaustive()
    }
}

/// Guard returned by [`ReentrantMutex::lock`].
///
/// Dereferences to the protected value and releases one nesting level when
/// dropped.
#[must_use = "if unused the mutex is released immediately"]
pub struct ReentrantMutexGuard<'a, T> {
    mutex: &'a ReentrantMutex<T>,
    _guard: ReentrantLockGuard<'a>,
}

impl<T> Deref for ReentrantMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.mutex.data
    }
}

impl<T: fmt::Debug> fmt::Debug for ReentrantMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    #[test]
    fn nested_guards_see_same_value() {
        let mutex = ReentrantMutex::new(Cell::new(0));

        let a = mutex.lock();
        let b = mutex.lock();
        a.set(1);

        assert_eq!(b.get(), 1);
        assert_eq!(mutex.raw().depth(), 2);

        drop(b);
        drop(a);
        assert!(!mutex.raw().is_locked());
    }

    #[test]
    fn get_mut_and_into_inner() {
        let mut mutex = ReentrantMutex::from(vec![1, 2]);

        mutex.get_mut().push(3);
        assert_eq!(mutex.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn debug_reads_value_when_free() {
        let mutex = ReentrantMutex::new(7);

        assert_eq!(format!("{mutex:?}"), "ReentrantMutex { data: 7, .. }");
    }
}
