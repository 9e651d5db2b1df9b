//! Fallback event using std::sync::Condvar
//!
//! Used on platforms without futex support.
//! Less efficient but portable.

use super::Event;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Condvar-based event (fallback)
pub struct CondvarEvent {
    /// Notification pending
    flag: Mutex<bool>,

    condvar: Condvar,

    /// Threads inside `wait`
    waiters: AtomicUsize,
}

impl CondvarEvent {
    /// Create a new fallback event
    pub fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    fn set(&self) {
        let mut pending = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = true;
    }
}

impl Default for CondvarEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl Event for CondvarEvent {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut pending = self.flag.lock().unwrap_or_else(PoisonError::into_inner);

        if !*pending {
            self.waiters.fetch_add(1, Ordering::SeqCst);
            pending = match timeout {
                Some(t) => {
                    self.condvar
                        .wait_timeout_while(pending, t, |p| !*p)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .condvar
                    .wait_while(pending, |p| !*p)
                    .unwrap_or_else(PoisonError::into_inner),
            };
            self.waiters.fetch_sub(1, Ordering::SeqCst);
        }

        std::mem::replace(&mut *pending, false)
    }

    fn notify_one(&self) {
        self.set();
        if self.waiters.load(Ordering::SeqCst) > 0 {
            self.condvar.notify_one();
        }
    }

    fn notify_all(&self) {
        self.set();
        if self.waiters.load(Ordering::SeqCst) > 0 {
            self.condvar.notify_all();
        }
    }

    fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}
