//! Error types for weft

use crate::status::FiberStatus;
use thiserror::Error;

/// Result type for fiber operations
pub type FiberResult<T> = Result<T, FiberError>;

/// Errors surfaced by the fallible fiber APIs
///
/// The infallible constructors treat stack exhaustion as fatal; these
/// variants only reach callers of the `try_*` entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FiberError {
    /// Stack allocation or protection failed
    #[error("stack error: {0}")]
    Stack(#[from] StackError),

    /// Operation not permitted in the fiber's current status
    #[error("cannot {op} a fiber that is {status}")]
    InvalidStatus {
        op: &'static str,
        status: FiberStatus,
    },

    /// A telemetry observer was already installed for this process
    #[error("fiber observer already installed")]
    ObserverAlreadySet,
}

/// Stack memory errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    /// Requested a zero-byte stack
    #[error("stack size must be non-zero")]
    ZeroSize,

    /// Requested size overflows or exceeds the configured maximum
    #[error("stack size too large")]
    TooLarge,

    /// mmap or the global allocator returned nothing
    #[error("stack allocation failed")]
    AllocationFailed,

    /// mprotect on the guard region failed
    #[error("guard page protection failed")]
    ProtectionFailed,

    /// munmap failed
    #[error("stack release failed")]
    ReleaseFailed,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = FiberError::Stack(StackError::AllocationFailed);
        assert_eq!(e.to_string(), "stack error: stack allocation failed");

        let e = FiberError::InvalidStatus {
            op: "resume",
            status: FiberStatus::Ended,
        };
        assert_eq!(e.to_string(), "cannot resume a fiber that is ended");
    }

    #[test]
    fn test_error_conversion() {
        let err: FiberError = StackError::TooLarge.into();
        assert!(matches!(err, FiberError::Stack(StackError::TooLarge)));
    }
}
