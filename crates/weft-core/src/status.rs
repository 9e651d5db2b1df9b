//! Fiber status state machine
//!
//! ```text
//! uninitialized ──(construct w/ callable | reset)──▶ initialized
//! initialized ──(resume)──▶ running
//! running ──(yield | resume another)──▶ yielded
//! yielded ──(resume)──▶ running
//! running ──(callable returns)──▶ ended
//! ended ──(reset)──▶ initialized
//! ```

use core::fmt;

/// Status of a fiber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FiberStatus {
    /// Stack allocated (or thread root), no callable installed
    Uninitialized = 0,

    /// Callable installed, never run
    Initialized = 1,

    /// Currently executing on its owning thread
    Running = 2,

    /// Callable returned; stable until the next reset
    Ended = 3,

    /// Suspended mid-callable, waiting to be resumed
    Yielded = 4,
}

impl FiberStatus {
    /// Whether `resume` may switch into a fiber in this status
    #[inline]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, FiberStatus::Initialized | FiberStatus::Yielded)
    }

    /// Whether `reset` may install a new callable
    #[inline]
    pub const fn is_resettable(&self) -> bool {
        matches!(self, FiberStatus::Uninitialized | FiberStatus::Ended)
    }

    #[inline]
    pub const fn is_ended(&self) -> bool {
        matches!(self, FiberStatus::Ended)
    }

    /// Whether the fiber's saved context is meaningful
    #[inline]
    pub const fn has_context(&self) -> bool {
        matches!(self, FiberStatus::Initialized | FiberStatus::Yielded)
    }
}

impl From<u8> for FiberStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => FiberStatus::Initialized,
            2 => FiberStatus::Running,
            3 => FiberStatus::Ended,
            4 => FiberStatus::Yielded,
            _ => FiberStatus::Uninitialized,
        }
    }
}

impl From<FiberStatus> for u8 {
    fn from(status: FiberStatus) -> u8 {
        status as u8
    }
}

impl fmt::Display for FiberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FiberStatus::Uninitialized => "uninitialized",
            FiberStatus::Initialized => "initialized",
            FiberStatus::Running => "running",
            FiberStatus::Ended => "ended",
            FiberStatus::Yielded => "yielded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumable() {
        assert!(FiberStatus::Initialized.is_resumable());
        assert!(FiberStatus::Yielded.is_resumable());
        assert!(!FiberStatus::Running.is_resumable());
        assert!(!FiberStatus::Ended.is_resumable());
        assert!(!FiberStatus::Uninitialized.is_resumable());
    }

    #[test]
    fn test_resettable() {
        assert!(FiberStatus::Uninitialized.is_resettable());
        assert!(FiberStatus::Ended.is_resettable());
        assert!(!FiberStatus::Initialized.is_resettable());
        assert!(!FiberStatus::Running.is_resettable());
        assert!(!FiberStatus::Yielded.is_resettable());
    }

    #[test]
    fn test_u8_roundtrip_and_invalid() {
        for s in [
            FiberStatus::Uninitialized,
            FiberStatus::Initialized,
            FiberStatus::Running,
            FiberStatus::Ended,
            FiberStatus::Yielded,
        ] {
            assert_eq!(FiberStatus::from(u8::from(s)), s);
        }
        assert_eq!(FiberStatus::from(200), FiberStatus::Uninitialized);
    }

    #[test]
    fn test_display() {
        assert_eq!(FiberStatus::Yielded.to_string(), "yielded");
        assert_eq!(FiberStatus::Ended.to_string(), "ended");
    }
}
