//! Portable stack implementation on the global allocator
//!
//! No page protection is available here, so guard pages are not mapped.

use std::alloc::{alloc, dealloc, Layout};
use weft_core::constants::STACK_ALIGN;
use weft_core::error::StackError;

const GRANULE: usize = 4096;

pub(super) fn allocate(
    size: usize,
    _guard_pages: usize,
) -> Result<(*mut u8, usize, usize), StackError> {
    let len = size
        .checked_add(GRANULE - 1)
        .ok_or(StackError::TooLarge)?
        & !(GRANULE - 1);
    let layout = Layout::from_size_align(len, STACK_ALIGN).map_err(|_| StackError::TooLarge)?;

    let base = unsafe { alloc(layout) };
    if base.is_null() {
        return Err(StackError::AllocationFailed);
    }
    Ok((base, len, len))
}

/// # Safety
///
/// `base`/`len` must come from `allocate` and not be used afterwards.
pub(super) unsafe fn release(base: *mut u8, len: usize) -> Result<(), StackError> {
    let layout = Layout::from_size_align(len, STACK_ALIGN).map_err(|_| StackError::ReleaseFailed)?;
    dealloc(base, layout);
    Ok(())
}
