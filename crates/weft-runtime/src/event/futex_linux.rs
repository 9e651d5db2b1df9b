//! Linux futex-based event
//!
//! Futex word semantics:
//! - 0 = no notification pending
//! - 1 = notification pending
//!
//! Waiting:
//! 1. Increment waiter count
//! 2. Swap the word to 0; if it was 1, return at once
//! 3. FUTEX_WAIT while the word is 0
//! 4. Swap the word to 0 again to consume what woke us
//!
//! Notifying:
//! 1. Set the word to 1
//! 2. FUTEX_WAKE only if someone is waiting

use super::Event;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Linux futex-based event
pub struct FutexEvent {
    /// Futex word: 0 = nothing pending, 1 = notified
    futex: AtomicU32,

    /// Threads inside `wait` (skips the syscall when zero)
    waiters: AtomicUsize,
}

impl FutexEvent {
    /// Create a new futex event
    pub fn new() -> Self {
        Self {
            futex: AtomicU32::new(0),
            waiters: AtomicUsize::new(0),
        }
    }

    fn wake(&self, count: i32) {
        self.futex.store(1, Ordering::SeqCst);

        if self.waiters.load(Ordering::SeqCst) == 0 {
            return; // Flag stays set for the next waiter
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl Event for FutexEvent {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        self.waiters.fetch_add(1, Ordering::SeqCst);

        if self.futex.swap(0, Ordering::SeqCst) != 0 {
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            return true;
        }

        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });

        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // FUTEX_WAIT: sleep while futex == 0. A notify racing with us
        // changes the word first, so the kernel returns EAGAIN.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }

        self.waiters.fetch_sub(1, Ordering::SeqCst);

        // Whatever the syscall result (woken, ETIMEDOUT, EAGAIN, EINTR),
        // the flag says whether a notification is there to consume.
        self.futex.swap(0, Ordering::SeqCst) != 0
    }

    fn notify_one(&self) {
        self.wake(1);
    }

    fn notify_all(&self) {
        self.wake(i32::MAX);
    }

    fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}
