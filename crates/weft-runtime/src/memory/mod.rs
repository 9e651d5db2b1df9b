//! Fiber stack memory
//!
//! Platform-specific implementations handle allocation:
//! - unix: anonymous `mmap` with `PROT_NONE` guard pages at the low end,
//!   so running off the bottom of a stack faults instead of corrupting
//!   the neighbouring allocation
//! - elsewhere: the global allocator, no guard

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as sys;
    } else {
        mod fallback;
        use fallback as sys;
    }
}

use weft_core::constants::MAX_STACK_SIZE;
use weft_core::error::StackError;
use weft_core::kwarn;

/// An owned, exclusively-used call stack
///
/// ```text
/// base                    base + guard            base + len
///  │  guard (PROT_NONE)    │  usable (RW) ...  ◀─── │ top
/// ```
pub struct Stack {
    /// Start of the whole mapping (guard included)
    base: *mut u8,
    /// Length of the whole mapping
    len: usize,
    /// Bytes available to the fiber
    usable: usize,
}

impl Stack {
    /// Allocate a stack of at least `size` usable bytes with the
    /// configured number of guard pages.
    pub fn new(size: usize) -> Result<Self, StackError> {
        Self::with_guard(size, crate::config::global().guard_pages)
    }

    /// Allocate a stack of at least `size` usable bytes with
    /// `guard_pages` inaccessible pages below it.
    ///
    /// The size is rounded up to the page size. Platforms without page
    /// protection ignore `guard_pages`.
    pub fn with_guard(size: usize, guard_pages: usize) -> Result<Self, StackError> {
        if size == 0 {
            return Err(StackError::ZeroSize);
        }
        if size > MAX_STACK_SIZE {
            return Err(StackError::TooLarge);
        }
        let (base, len, usable) = sys::allocate(size, guard_pages)?;
        Ok(Stack { base, len, usable })
    }

    /// Highest address of the stack (stacks grow down)
    #[inline]
    pub fn top(&self) -> *mut u8 {
        // SAFETY: base + len is one past the end of the mapping
        unsafe { self.base.add(self.len) }
    }

    /// Lowest usable address
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        // SAFETY: usable <= len
        unsafe { self.top().sub(self.usable) }
    }

    /// Usable size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.usable
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: base/len came from sys::allocate and are released once
        if let Err(e) = unsafe { sys::release(self.base, self.len) } {
            kwarn!("failed to release fiber stack at {:p}: {}", self.base, e);
        }
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("top", &self.top())
            .field("size", &self.usable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_bounds() {
        let stack = Stack::with_guard(64 * 1024, 1).unwrap();
        assert!(stack.size() >= 64 * 1024);
        assert_eq!(stack.top() as usize - stack.bottom() as usize, stack.size());
        assert_eq!(stack.top() as usize % 16, 0);

        // Whole usable range is writable
        unsafe {
            stack.bottom().write(0xAA);
            stack.top().sub(1).write(0x55);
            assert_eq!(stack.bottom().read(), 0xAA);
        }
    }

    #[test]
    fn test_size_rounded_up() {
        let stack = Stack::with_guard(20_000, 0).unwrap();
        assert!(stack.size() >= 20_000);
    }

    #[test]
    fn test_invalid_sizes() {
        assert_eq!(Stack::with_guard(0, 1).unwrap_err(), StackError::ZeroSize);
        assert_eq!(
            Stack::with_guard(MAX_STACK_SIZE + 1, 1).unwrap_err(),
            StackError::TooLarge
        );
    }
}
