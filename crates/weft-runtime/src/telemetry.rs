//! Fiber lifecycle telemetry
//!
//! Stackful fibers announce `on_begin` when a callable is installed
//! (construction or reset) and `on_detach` when that life ends (the
//! callable returns, or the fiber is destroyed before it could).
//!
//! One observer may be installed per process. Without one, events are
//! logged at trace level.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;
use weft_core::error::{FiberError, FiberResult};
use weft_core::id::FiberId;
use weft_core::{ktrace, kwarn};

/// Receiver of fiber lifecycle events
///
/// Called on the thread (and stack) of the fiber concerned. A panic is
/// caught and logged.
pub trait FiberObserver: Send + Sync {
    fn on_begin(&self, id: FiberId);
    fn on_detach(&self, id: FiberId);
}

static OBSERVER: OnceLock<Box<dyn FiberObserver>> = OnceLock::new();

/// Install the process-wide observer.
///
/// Fails with `ObserverAlreadySet` if one is already installed.
pub fn set_observer<O: FiberObserver + 'static>(observer: O) -> FiberResult<()> {
    OBSERVER
        .set(Box::new(observer))
        .map_err(|_| FiberError::ObserverAlreadySet)
}

pub(crate) fn begin(id: FiberId) {
    match OBSERVER.get() {
        Some(obs) => guarded("on_begin", id, || obs.on_begin(id)),
        None => ktrace!("begin virtual thread {}", id),
    }
}

pub(crate) fn detach(id: FiberId) {
    match OBSERVER.get() {
        Some(obs) => guarded("on_detach", id, || obs.on_detach(id)),
        None => ktrace!("detach virtual thread {}", id),
    }
}

fn guarded(hook: &str, id: FiberId, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        kwarn!("fiber observer panicked in {} for fiber {}", hook, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{resume, Fiber};
    use std::sync::Mutex;

    static BEGUN: Mutex<Vec<u64>> = Mutex::new(Vec::new());
    static DETACHED: Mutex<Vec<u64>> = Mutex::new(Vec::new());
    static PANIC_ON: Mutex<Vec<u64>> = Mutex::new(Vec::new());

    struct Recorder;

    impl FiberObserver for Recorder {
        fn on_begin(&self, id: FiberId) {
            BEGUN.lock().unwrap().push(id.as_u64());
        }

        fn on_detach(&self, id: FiberId) {
            DETACHED.lock().unwrap().push(id.as_u64());
            if PANIC_ON.lock().unwrap().contains(&id.as_u64()) {
                panic!("observer failure");
            }
        }
    }

    #[test]
    fn test_observer_lifecycle() {
        assert!(set_observer(Recorder).is_ok());
        assert_eq!(set_observer(Recorder), Err(FiberError::ObserverAlreadySet));

        let mut fiber = Fiber::with_stack_size(64 * 1024, || {});
        let id = fiber.id().as_u64();
        assert!(BEGUN.lock().unwrap().contains(&id));
        assert!(!DETACHED.lock().unwrap().contains(&id));

        resume(&mut fiber);
        assert!(fiber.status().is_ended());
        assert!(DETACHED.lock().unwrap().contains(&id));

        // Reset starts a new life of the same id: one begin and one
        // detach per life
        fiber.reset(|| {}, 0);
        resume(&mut fiber);
        let count = |v: &[u64]| v.iter().filter(|&&x| x == id).count();
        assert_eq!(count(&BEGUN.lock().unwrap()[..]), 2);
        assert_eq!(count(&DETACHED.lock().unwrap()[..]), 2);

        // A panicking observer does not disturb the switch back
        let mut fiber = Fiber::with_stack_size(64 * 1024, || {});
        PANIC_ON.lock().unwrap().push(fiber.id().as_u64());
        resume(&mut fiber);
        assert!(fiber.status().is_ended());

        // Root fibers are not announced
        let root = Fiber::root();
        assert!(!BEGUN.lock().unwrap().contains(&root.id().as_u64()));
    }
}
