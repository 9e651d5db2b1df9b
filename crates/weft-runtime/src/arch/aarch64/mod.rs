//! aarch64 context switching implementation (Linux, macOS Apple Silicon)
//!
//! Frame saved on the suspended stack, `fctx` points at its base:
//!
//! ```text
//! 0x00  d8  .. d15
//! 0x40  x19 .. x28
//! 0x90  fp, lr
//! 0xa0  pc (resume address)
//! ```
//!
//! x18 is the platform register and is left alone.

use crate::arch::{align_down, Context, EntryFn, FixupFn, Transfer};
use std::arch::naked_asm;

const FRAME_SIZE: usize = 0xb0;

/// Build the initial frame for a fresh stack.
///
/// # Safety
///
/// `top` must be the highest address of a writable region of at least
/// `size` bytes, and `size` must exceed the frame.
pub unsafe fn make_context(top: *mut u8, size: usize, entry: EntryFn) -> Context {
    debug_assert!(size > FRAME_SIZE + 0x10);

    let sp = align_down(top) - FRAME_SIZE - 0x10;
    let frame = sp as *mut u8;
    std::ptr::write_bytes(frame, 0, FRAME_SIZE + 0x10);

    (frame.add(0x40) as *mut usize).write(entry as usize);
    // lr for the fixup's `ret`, pc for a plain jump
    (frame.add(0x98) as *mut usize).write(entry_trampoline as usize);
    (frame.add(0xa0) as *mut usize).write(entry_trampoline as usize);

    Context::from_ptr(frame)
}

/// First code run on a fresh context: x0:x1 hold the `Transfer`, x19
/// the entry function.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "blr x19",
        // entry never returns
        "brk #0",
    );
}

/// Switch to `to`, passing `data`.
///
/// # Safety
///
/// `to` must be a context produced by `make_context` or a suspended
/// switch, not currently running, whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn jump_context(_to: Context, _data: *mut u8) -> Transfer {
    naked_asm!(
        "sub sp, sp, #0xb0",
        "stp d8, d9, [sp, #0x00]",
        "stp d10, d11, [sp, #0x10]",
        "stp d12, d13, [sp, #0x20]",
        "stp d14, d15, [sp, #0x30]",
        "stp x19, x20, [sp, #0x40]",
        "stp x21, x22, [sp, #0x50]",
        "stp x23, x24, [sp, #0x60]",
        "stp x25, x26, [sp, #0x70]",
        "stp x27, x28, [sp, #0x80]",
        "stp fp, lr, [sp, #0x90]",
        "str lr, [sp, #0xa0]",
        "mov x4, sp",
        // Load target's state
        "mov sp, x0",
        "ldp d8, d9, [sp, #0x00]",
        "ldp d10, d11, [sp, #0x10]",
        "ldp d12, d13, [sp, #0x20]",
        "ldp d14, d15, [sp, #0x30]",
        "ldp x19, x20, [sp, #0x40]",
        "ldp x21, x22, [sp, #0x50]",
        "ldp x23, x24, [sp, #0x60]",
        "ldp x25, x26, [sp, #0x70]",
        "ldp x27, x28, [sp, #0x80]",
        "ldp fp, lr, [sp, #0x90]",
        "ldr x5, [sp, #0xa0]",
        // Transfer { fctx: x0, data: x1 }
        "mov x0, x4",
        "add sp, sp, #0xb0",
        "ret x5",
    );
}

/// Switch to `to` and run `fixup` on its stack before it continues.
///
/// # Safety
///
/// As for [`jump_context`]; `fixup` must not unwind.
#[unsafe(naked)]
pub unsafe extern "C" fn ontop_context(
    _to: Context,
    _data: *mut u8,
    _fixup: FixupFn,
) -> Transfer {
    naked_asm!(
        "sub sp, sp, #0xb0",
        "stp d8, d9, [sp, #0x00]",
        "stp d10, d11, [sp, #0x10]",
        "stp d12, d13, [sp, #0x20]",
        "stp d14, d15, [sp, #0x30]",
        "stp x19, x20, [sp, #0x40]",
        "stp x21, x22, [sp, #0x50]",
        "stp x23, x24, [sp, #0x60]",
        "stp x25, x26, [sp, #0x70]",
        "stp x27, x28, [sp, #0x80]",
        "stp fp, lr, [sp, #0x90]",
        "str lr, [sp, #0xa0]",
        "mov x4, sp",
        "mov sp, x0",
        "ldp d8, d9, [sp, #0x00]",
        "ldp d10, d11, [sp, #0x10]",
        "ldp d12, d13, [sp, #0x20]",
        "ldp d14, d15, [sp, #0x30]",
        "ldp x19, x20, [sp, #0x40]",
        "ldp x21, x22, [sp, #0x50]",
        "ldp x23, x24, [sp, #0x60]",
        "ldp x25, x26, [sp, #0x70]",
        "ldp x27, x28, [sp, #0x80]",
        // lr is the target's resume address, so the fixup returns there
        "ldp fp, lr, [sp, #0x90]",
        "mov x0, x4",
        "add sp, sp, #0xb0",
        "br x2",
    );
}
