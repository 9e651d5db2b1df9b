//! # weft-runtime
//!
//! Platform-specific runtime for weft fibers.
//!
//! This crate provides:
//! - Context switching (architecture-specific assembly)
//! - Fiber stacks (mmap with guard pages, std::alloc elsewhere)
//! - Thread-local tracking of the running fiber
//! - The `Fiber` type and its resume/yield operations
//! - An in-process job `Executor` with a platform wait/notify `Event`
//! - Fiber lifecycle telemetry hooks
//!
//! The context-switch engine is internal; fibers are the only way to
//! switch stacks:
//!
//! ```compile_fail
//! let _ = weft_runtime::arch::context_fixup;
//! ```

pub mod config;
pub mod memory;
pub(crate) mod arch;
pub mod tls;
pub mod event;
pub mod telemetry;
pub mod fiber;
pub mod executor;

// Re-exports
pub use config::RuntimeConfig;
pub use memory::Stack;
pub use event::{new_event, Event, PlatformEvent};
pub use telemetry::{set_observer, FiberObserver};
pub use fiber::{current_id, resume, try_resume, yield_now, yield_to, Fiber};
pub use executor::Executor;

cfg_if::cfg_if! {
    if #[cfg(not(any(target_arch = "x86_64", all(target_arch = "aarch64", not(windows)))))] {
        compile_error!("Unsupported architecture");
    }
}
