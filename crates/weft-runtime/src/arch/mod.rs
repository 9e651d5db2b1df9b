//! Architecture-specific context switching
//!
//! Each backend provides three primitives over an opaque saved context:
//!
//! - `make_context` lays out an initial frame at the top of a fresh stack
//!   so that the first switch into it enters a trampoline, which calls the
//!   entry function with the incoming [`Transfer`].
//! - `jump_context` saves the caller's callee-saved registers on its own
//!   stack, loads the target's and continues the target. The target sees a
//!   `Transfer` holding the caller's context and the payload.
//! - `ontop_context` does the same, but calls a fixup function with that
//!   `Transfer` on the target's stack before the target continues. The
//!   fixup's return value is what the target observes.
//!
//! The caller's context is only known once it has been suspended, so the
//! fixup is where it gets stored into the suspending fiber.

use std::fmt;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use self::x86_64::{jump_context, make_context, ontop_context};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use self::aarch64::{jump_context, make_context, ontop_context};
    }
}

/// Saved machine context: the stack pointer of a suspended frame
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Context(*mut u8);

impl Context {
    /// No saved context
    #[inline]
    pub const fn null() -> Self {
        Context(std::ptr::null_mut())
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    #[inline]
    pub(crate) const fn from_ptr(p: *mut u8) -> Self {
        Context(p)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:p})", self.0)
    }
}

/// What a switched-to context receives: the context that was just
/// suspended and the payload pointer passed along with the switch
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Transfer {
    pub fctx: Context,
    pub data: *mut u8,
}

/// Entry function invoked by the trampoline on a fresh context
pub type EntryFn = extern "C" fn(Transfer) -> !;

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", windows))] {
        /// Fixup as called by the Windows backend: the `Transfer` lives on
        /// the target's stack and is passed by address.
        pub type FixupFn = unsafe extern "C" fn(*mut Transfer);

        /// Fixup used by the fiber engine on this target
        pub const CONTEXT_FIXUP: FixupFn = self::x86_64::context_fixup;
    } else {
        /// Fixup as called by `ontop_context`
        pub type FixupFn = unsafe extern "C" fn(Transfer) -> Transfer;

        /// Fixup used by the fiber engine on this target
        pub const CONTEXT_FIXUP: FixupFn = context_fixup;
    }
}

/// Store the suspended context into the slot the payload names.
///
/// `t.data` must point to a pointer-sized field that itself holds the
/// address of a [`Context`] slot. Both System V and AAPCS64 pass and
/// return a two-pointer struct in registers, so an ordinary function
/// works as the fixup there.
///
/// # Safety
///
/// Both pointers must be valid for the duration of the call.
#[cfg_attr(all(target_arch = "x86_64", windows), allow(dead_code))]
pub unsafe extern "C" fn context_fixup(t: Transfer) -> Transfer {
    let slot = *(t.data as *const *mut Context);
    slot.write(t.fctx);
    t
}

/// Round a stack top down to the ABI alignment
#[inline]
pub(crate) fn align_down(top: *mut u8) -> usize {
    (top as usize) & !(weft_core::constants::STACK_ALIGN - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Stack;
    use std::cell::Cell;

    thread_local! {
        static ORIGIN: Cell<Context> = const { Cell::new(Context::null()) };
        static HITS: Cell<usize> = const { Cell::new(0) };
    }

    extern "C" fn bounce(t: Transfer) -> ! {
        ORIGIN.with(|c| c.set(t.fctx));
        HITS.with(|h| h.set(h.get() + t.data as usize));
        let back = ORIGIN.with(|c| c.get());
        let t = unsafe { jump_context(back, 7 as *mut u8) };
        ORIGIN.with(|c| c.set(t.fctx));
        HITS.with(|h| h.set(h.get() + t.data as usize));
        let back = ORIGIN.with(|c| c.get());
        unsafe { jump_context(back, 9 as *mut u8) };
        unreachable!();
    }

    #[test]
    fn test_jump_round_trip() {
        let stack = Stack::new(64 * 1024).unwrap();
        let ctx = unsafe { make_context(stack.top(), stack.size(), bounce) };

        let t = unsafe { jump_context(ctx, 1 as *mut u8) };
        assert_eq!(t.data as usize, 7);
        assert_eq!(HITS.with(|h| h.get()), 1);

        let t = unsafe { jump_context(t.fctx, 2 as *mut u8) };
        assert_eq!(t.data as usize, 9);
        assert_eq!(HITS.with(|h| h.get()), 3);
    }

    #[test]
    fn test_context_fixup_stores_slot() {
        let mut slot = Context::null();
        let slot_ptr: *mut Context = &mut slot;
        let mut record = slot_ptr;
        let t = Transfer {
            fctx: Context::from_ptr(0x1000 as *mut u8),
            data: (&mut record as *mut *mut Context).cast(),
        };
        let out = unsafe { context_fixup(t) };
        assert_eq!(slot, Context::from_ptr(0x1000 as *mut u8));
        assert_eq!(out.fctx, t.fctx);
    }
}
