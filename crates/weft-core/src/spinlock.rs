//! Spinning mutex for very short critical sections
//!
//! The executor guards its pending-job counter with this lock. Holders
//! never block or switch fibers while holding it, so a test-and-test-and-set
//! loop that falls back to `thread::yield_now` under contention is enough.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Spin rounds before the waiter starts yielding its OS thread
const SPINS_BEFORE_YIELD: u32 = 6;

/// A mutual-exclusion lock that spins instead of parking
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// Safety: access to `value` is serialized by `locked`
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        if self.try_acquire() {
            return SpinLockGuard { lock: self };
        }
        self.lock_contended()
    }

    #[cold]
    fn lock_contended(&self) -> SpinLockGuard<'_, T> {
        let mut round = 0u32;
        loop {
            // Read-only wait so contended cores don't bounce the line
            while self.locked.load(Ordering::Relaxed) {
                if round < SPINS_BEFORE_YIELD {
                    for _ in 0..(1u32 << round) {
                        core::hint::spin_loop();
                    }
                    round += 1;
                } else {
                    std::thread::yield_now();
                }
            }
            if self.try_acquire() {
                return SpinLockGuard { lock: self };
            }
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire the lock only if it is free right now
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLockGuard { lock: self })
    }

    /// Run `f` with the lock held
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        SpinLock::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("SpinLock").field("value", &*guard).finish(),
            None => f.write_str("SpinLock { <locked> }"),
        }
    }
}

/// Releases the lock on drop
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: the guard proves the lock is held
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard proves the lock is held exclusively
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_and_with() {
        let lock = SpinLock::new(1u32);
        *lock.lock() += 1;
        let v = lock.with(|v| {
            *v *= 10;
            *v
        });
        assert_eq!(v, 20);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_try_lock_while_held() {
        let lock = SpinLock::new(());
        let held = lock.lock();
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());
        drop(held);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_contended_increments() {
        let lock = Arc::new(SpinLock::new(0usize));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        lock.with(|n| *n += 1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(Arc::try_unwrap(lock).unwrap().into_inner(), 16000);
    }

    #[test]
    fn test_debug_format() {
        let lock = SpinLock::new(5);
        assert_eq!(format!("{:?}", lock), "SpinLock { value: 5 }");
        let _held = lock.lock();
        assert_eq!(format!("{:?}", lock), "SpinLock { <locked> }");
    }
}
