//! Thread-local storage for fiber context
//!
//! Tracks which fiber is running on this OS thread. Threads that never
//! entered a fiber get an implicit root fiber on first use, which then
//! acts as the resumer of the first fiber they resume.

use crate::fiber::{Fiber, FiberInner};
use weft_core::id::FiberId;
use weft_core::kprint;
use std::cell::Cell;
use std::ptr;

thread_local! {
    /// Fiber whose context is live on this OS thread
    static CURRENT: Cell<*const FiberInner> = const { Cell::new(ptr::null()) };

    /// Implicit root for threads that resume without naming one
    static THREAD_ROOT: Fiber = Fiber::root();
}

/// Set the running fiber
#[inline]
pub(crate) fn set_current(fiber: *const FiberInner) {
    CURRENT.with(|cell| cell.set(fiber));

    // Log lines carry the id of stackful fibers only
    match unsafe { fiber.as_ref() } {
        Some(inner) if inner.has_stack() => kprint::set_fiber_tag(inner.id.as_u64()),
        _ => kprint::clear_fiber_tag(),
    }
}

/// Forget `fiber` if it is the running one (it is being destroyed)
#[inline]
pub(crate) fn clear_current_if(fiber: *const FiberInner) {
    let _ = CURRENT.try_with(|cell| {
        if ptr::eq(cell.get(), fiber) {
            cell.set(ptr::null());
            kprint::clear_fiber_tag();
        }
    });
}

/// The running fiber, or null
#[inline]
pub(crate) fn current() -> *const FiberInner {
    CURRENT.with(|cell| cell.get())
}

/// The running fiber, installing the implicit root if there is none
pub(crate) fn current_or_root() -> *const FiberInner {
    let cur = current();
    if !cur.is_null() {
        return cur;
    }
    let root = THREAD_ROOT.with(|root| root.inner_ptr());
    set_current(root);
    root
}

/// Get the running fiber's id, if a stackful fiber is running
#[inline]
pub fn current_fiber_id() -> Option<FiberId> {
    // SAFETY: CURRENT only ever holds live fibers (cleared on drop)
    unsafe { current().as_ref() }
        .filter(|inner| inner.has_stack())
        .map(|inner| inner.id)
}

/// Check if we're running inside a stackful fiber
#[inline]
pub fn is_in_fiber() -> bool {
    current_fiber_id().is_some()
}
