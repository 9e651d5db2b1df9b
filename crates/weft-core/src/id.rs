//! Fiber identifier type

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Process-wide id counter. Starts at zero, bumped on every fiber
/// construction.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a fiber
///
/// Ids are handed out in construction order and never reused within a
/// process. They exist for diagnostics and telemetry only; nothing in the
/// runtime looks fibers up by id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FiberId(u64);

impl FiberId {
    /// Allocate the next id.
    ///
    /// Fibers may be constructed on several threads at once, so the
    /// counter is bumped atomically.
    #[inline]
    pub fn next() -> Self {
        FiberId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value (for tests and telemetry sinks)
    #[inline]
    pub const fn from_raw(id: u64) -> Self {
        FiberId(id)
    }

    /// Get the raw value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<FiberId> for u64 {
    #[inline]
    fn from(id: FiberId) -> Self {
        id.0
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({})", self.0)
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_ids_are_monotonic() {
        let a = FiberId::next();
        let b = FiberId::next();
        assert!(b > a);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let mut handles = vec![];

        for _ in 0..4 {
            let seen = Arc::clone(&seen);
            handles.push(thread::spawn(move || {
                let local: Vec<_> = (0..1000).map(|_| FiberId::next()).collect();
                let mut seen = seen.lock().unwrap();
                for id in local {
                    assert!(seen.insert(id), "duplicate id {}", id);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 4000);
    }

    #[test]
    fn test_display() {
        let id = FiberId::from_raw(7);
        assert_eq!(format!("{}", id), "7");
        assert_eq!(format!("{:?}", id), "FiberId(7)");
        assert_eq!(u64::from(id), 7);
    }
}
