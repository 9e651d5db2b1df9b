//! # weft - stackful fibers and a job executor
//!
//! ## Features
//!
//! - **Fibers**: each with its own mmap'd stack and guard page, switched
//!   by hand-written assembly (x86_64 System V, x86_64 Windows, aarch64)
//! - **Manual control**: `resume` runs a fiber until it yields or ends;
//!   `yield_now` returns to whoever resumed it
//! - **Reuse**: ended fibers can be `reset` with a new callable, keeping
//!   their stack
//! - **Executor**: lock-free job queue drained by a worker thread that
//!   sleeps on a futex when idle
//!
//! ## Quick Start
//!
//! ```ignore
//! use weft::{resume, yield_now, Executor, Fiber};
//! use std::sync::Arc;
//!
//! let mut fiber = Fiber::new(|| {
//!     println!("step 1");
//!     yield_now();
//!     println!("step 2");
//! });
//! resume(&mut fiber);
//! resume(&mut fiber);
//! assert!(fiber.status().is_ended());
//!
//! let exec = Arc::new(Executor::new());
//! let worker = Arc::clone(&exec).spawn_worker().unwrap();
//! exec.push(|| println!("job"));
//! exec.stop();
//! worker.join().unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  User Code                    │
//! │     Fiber::new, resume, yield_now, push       │
//! └───────────────────────────────────────────────┘
//!                │                     │
//!                ▼                     ▼
//! ┌───────────────────────┐  ┌────────────────────┐
//! │        Fiber          │  │      Executor      │
//! │ status, resumer, TLS  │  │ SegQueue + Event   │
//! └───────────────────────┘  └────────────────────┘
//!                │
//!                ▼
//! ┌───────────────────────────────────────────────┐
//! │   Context switch (ontop + fixup) │  Stack     │
//! │   naked asm per architecture     │  mmap      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! - `WEFT_STACK_SIZE` - default fiber stack size (`512K`, `1M`, ...)
//! - `WEFT_GUARD_PAGES` - guard pages below each stack
//! - `WEFT_PARK_TIMEOUT_MS` - executor idle wait bound
//! - `WEFT_DEBUG` - debug logging of switches and executor activity
//! - `WEFT_LOG_LEVEL` - off, error, warn, info, debug, trace
//! - `WEFT_FLUSH_EPRINT` - flush stderr after each log line

// Re-export core types
pub use weft_core::{
    ConfigError,
    FiberError,
    FiberId,
    FiberResult,
    FiberStatus,
    SpinLock,
    SpinLockGuard,
    StackError,
};

// Re-export kprint macros for debug logging
pub use weft_core::{kerror, kwarn, kinfo, kdebug, ktrace};
pub use weft_core::kprint::{LogLevel, init as init_logging, set_log_level};

// Re-export env utilities
pub use weft_core::{env_get, env_get_bool, env_get_bytes};

// Re-export runtime types
pub use weft_runtime::{
    current_id,
    new_event,
    resume,
    set_observer,
    try_resume,
    yield_now,
    yield_to,
    Event,
    Executor,
    Fiber,
    FiberObserver,
    PlatformEvent,
    RuntimeConfig,
    Stack,
};

pub use weft_runtime::config;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fibers_inside_executor_job() {
        let exec = Arc::new(Executor::new());
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let total = Arc::clone(&total);
            exec.push(move || {
                // Fibers are created and driven on the worker thread
                let steps = Rc::new(Cell::new(0));
                let s = Rc::clone(&steps);
                let mut fiber = Fiber::with_stack_size(64 * 1024, move || {
                    s.set(s.get() + 1);
                    yield_now();
                    s.set(s.get() + 1);
                });
                while !fiber.status().is_ended() {
                    resume(&mut fiber);
                }
                total.fetch_add(steps.get(), Ordering::SeqCst);
            });
        }

        let worker = Arc::clone(&exec).spawn_worker().unwrap();
        exec.stop();
        worker.join().unwrap();

        assert_eq!(total.load(Ordering::SeqCst), 8);
        assert_eq!(exec.pending(), 0);
    }
}
