//! # weft-core
//!
//! Core types for weft fibers.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Context switching, stack memory and the executor live in `weft-runtime`.
//!
//! ## Modules
//!
//! - `id` - Fiber identifier type and the process-wide id counter
//! - `status` - Fiber status state machine
//! - `error` - Error types
//! - `spinlock` - Short-critical-section lock used by the executor
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod status;
pub mod error;
pub mod spinlock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::FiberId;
pub use status::FiberStatus;
pub use error::{ConfigError, FiberError, FiberResult, StackError};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use env::{env_get, env_get_bool, env_get_bytes};

/// Constants shared by the runtime
pub mod constants {
    /// Default fiber stack size (512 KiB)
    pub const DEFAULT_STACK_SIZE: usize = 512 * 1024;

    /// Smallest stack a fiber may be configured with
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Largest stack a fiber may request (1 GiB)
    pub const MAX_STACK_SIZE: usize = 1 << 30;

    /// Stack alignment required by every supported ABI
    pub const STACK_ALIGN: usize = 16;
}
