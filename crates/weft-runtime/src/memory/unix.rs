//! Unix stack implementation using mmap

use weft_core::error::StackError;

/// System page size (cached after the first call)
pub(super) fn page_size() -> usize {
    use std::sync::OnceLock;
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| {
        let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if ps > 0 {
            ps as usize
        } else {
            4096
        }
    })
}

/// Map `size` bytes (rounded up to pages) plus `guard_pages` guard pages.
///
/// Returns `(base, len, usable)`.
pub(super) fn allocate(
    size: usize,
    guard_pages: usize,
) -> Result<(*mut u8, usize, usize), StackError> {
    let page = page_size();
    let usable = size
        .checked_add(page - 1)
        .ok_or(StackError::TooLarge)?
        & !(page - 1);
    let guard = guard_pages.checked_mul(page).ok_or(StackError::TooLarge)?;
    let len = usable.checked_add(guard).ok_or(StackError::TooLarge)?;

    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };

    if base == libc::MAP_FAILED {
        return Err(StackError::AllocationFailed);
    }

    // Guard region at the low end stays inaccessible
    if guard > 0 {
        let ret = unsafe { libc::mprotect(base, guard, libc::PROT_NONE) };
        if ret != 0 {
            unsafe { libc::munmap(base, len) };
            return Err(StackError::ProtectionFailed);
        }
    }

    Ok((base as *mut u8, len, usable))
}

/// Unmap a region returned by [`allocate`].
///
/// # Safety
///
/// `base`/`len` must come from `allocate` and not be used afterwards.
pub(super) unsafe fn release(base: *mut u8, len: usize) -> Result<(), StackError> {
    if libc::munmap(base as *mut libc::c_void, len) != 0 {
        return Err(StackError::ReleaseFailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_power_of_two() {
        assert!(page_size().is_power_of_two());
    }

    #[test]
    fn test_allocate_layout() {
        let page = page_size();
        let (base, len, usable) = allocate(page + 1, 2).unwrap();
        assert_eq!(usable, 2 * page);
        assert_eq!(len, 4 * page);
        unsafe { release(base, len).unwrap() };
    }
}
