//! Wait/notify event for idle executor workers
//!
//! Platform-specific implementations use the most efficient primitive
//! available.
//!
//! The event carries a sticky wake flag. A notify always sets it, so a
//! notify that lands between a waiter's last check for work and its sleep
//! is never lost: the waiter consumes the flag and returns immediately.
//! Each wait consumes the flag (auto-reset).

use std::time::Duration;

/// Platform-specific wait/notify mechanism
///
/// Consumers call `wait()` when no work is available.
/// Producers call `notify_one()` after publishing work, `notify_all()`
/// on shutdown.
pub trait Event: Send + Sync {
    /// Block until notified or timeout
    ///
    /// Returns:
    /// - `true` if a notification was consumed
    /// - `false` on timeout or spurious wakeup
    ///
    /// Callers should re-check their condition regardless of the result.
    fn wait(&self, timeout: Option<Duration>) -> bool;

    /// Wake one waiter, or let the next `wait` return immediately
    fn notify_one(&self);

    /// Wake all current waiters
    fn notify_all(&self);

    /// Number of threads currently blocked in `wait` (hint, may be stale)
    fn waiter_count(&self) -> usize;
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexEvent as PlatformEvent;
    } else {
        mod fallback;
        pub use fallback::CondvarEvent as PlatformEvent;
    }
}

/// Create a new platform-appropriate event
pub fn new_event() -> Box<dyn Event> {
    Box::new(PlatformEvent::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout() {
        let event = new_event();
        let start = Instant::now();
        let result = event.wait(Some(Duration::from_millis(50)));
        let elapsed = start.elapsed();

        assert!(!result);
        assert!(elapsed >= Duration::from_millis(40)); // Allow some slack
    }

    #[test]
    fn test_notify_before_wait_is_sticky() {
        let event = PlatformEvent::new();
        event.notify_one();

        let start = Instant::now();
        assert!(event.wait(Some(Duration::from_secs(10))));
        assert!(start.elapsed() < Duration::from_secs(1));

        // Consumed: the next wait times out
        assert!(!event.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_notify_one_wakes_waiter() {
        let event = Arc::new(PlatformEvent::new());
        let event2 = Arc::clone(&event);

        let handle = thread::spawn(move || event2.wait(Some(Duration::from_secs(10))));

        // Give thread time to block
        while event.waiter_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        event.notify_one();

        assert!(handle.join().unwrap());
        assert_eq!(event.waiter_count(), 0);
    }

    #[test]
    fn test_notify_all_releases_everyone() {
        let event = Arc::new(PlatformEvent::new());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let e = Arc::clone(&event);
                thread::spawn(move || {
                    let start = Instant::now();
                    e.wait(Some(Duration::from_secs(10)));
                    start.elapsed()
                })
            })
            .collect();

        while event.waiter_count() < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        // Let all three reach the kernel
        thread::sleep(Duration::from_millis(50));
        event.notify_all();

        for h in handles {
            assert!(h.join().unwrap() < Duration::from_secs(5));
        }
    }
}
