//! System V AMD64 backend (Linux, macOS, BSD)
//!
//! Frame saved on the suspended stack, `fctx` points at its base:
//!
//! ```text
//! 0x00  mxcsr (u32) | x87 control word (u16)
//! 0x08  r12
//! 0x10  r13
//! 0x18  r14
//! 0x20  r15
//! 0x28  rbx
//! 0x30  rbp
//! 0x38  return address
//! ```

use super::MXCSR_DEFAULT;
use crate::arch::{align_down, Context, EntryFn, FixupFn, Transfer};
use std::arch::naked_asm;

/// x87 control word: extended precision, all exceptions masked
const FPU_CW_DEFAULT: u16 = 0x037F;

const FRAME_SIZE: usize = 0x40;

/// Build the initial frame for a fresh stack.
///
/// The first switch into the returned context lands in
/// `entry_trampoline`, which calls `entry` with the incoming `Transfer`.
///
/// # Safety
///
/// `top` must be the highest address of a writable region of at least
/// `size` bytes, and `size` must exceed the frame.
pub unsafe fn make_context(top: *mut u8, size: usize, entry: EntryFn) -> Context {
    debug_assert!(size > FRAME_SIZE + 0x10);

    // One spare 16-byte slot above the frame keeps rsp aligned when the
    // trampoline starts.
    let sp = align_down(top) - FRAME_SIZE - 0x10;
    let frame = sp as *mut u8;
    std::ptr::write_bytes(frame, 0, FRAME_SIZE + 0x10);

    (frame as *mut u32).write(MXCSR_DEFAULT);
    (frame.add(0x04) as *mut u16).write(FPU_CW_DEFAULT);
    (frame.add(0x08) as *mut usize).write(entry as usize);
    (frame.add(0x38) as *mut usize).write(entry_trampoline as usize);

    Context::from_ptr(frame)
}

/// First code run on a fresh context.
///
/// rax:rdx hold the `Transfer` (from the switch or the fixup), r12 the
/// entry function.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, rax",
        "mov rsi, rdx",
        "call r12",
        // entry never returns
        "ud2",
    );
}

/// Switch to `to`, passing `data`.
///
/// Returns when some context switches back here.
///
/// # Safety
///
/// `to` must be a context produced by `make_context` or a suspended
/// switch, not currently running, whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn jump_context(_to: Context, _data: *mut u8) -> Transfer {
    naked_asm!(
        // Save callee-saved state below the return address
        "lea rsp, [rsp - 0x38]",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 0x04]",
        "mov [rsp + 0x08], r12",
        "mov [rsp + 0x10], r13",
        "mov [rsp + 0x18], r14",
        "mov [rsp + 0x20], r15",
        "mov [rsp + 0x28], rbx",
        "mov [rsp + 0x30], rbp",
        // Our context is the frame base
        "mov rax, rsp",
        // Load target's state
        "mov rsp, rdi",
        "mov r8, [rsp + 0x38]",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 0x04]",
        "mov r12, [rsp + 0x08]",
        "mov r13, [rsp + 0x10]",
        "mov r14, [rsp + 0x18]",
        "mov r15, [rsp + 0x20]",
        "mov rbx, [rsp + 0x28]",
        "mov rbp, [rsp + 0x30]",
        // Pop the frame and the return address
        "lea rsp, [rsp + 0x40]",
        // Transfer { fctx: rax, data: rdx }
        "mov rdx, rsi",
        "mov rdi, rax",
        "jmp r8",
    );
}

/// Switch to `to` and run `fixup` on its stack before it continues.
///
/// The target observes the value `fixup` returns.
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
        "mov r8, rdx",
        "lea rsp, [rsp - 0x38]",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 0x04]",
        "mov [rsp + 0x08], r12",
        "mov [rsp + 0x10], r13",
        "mov [rsp + 0x18], r14",
        "mov [rsp + 0x20], r15",
        "mov [rsp + 0x28], rbx",
        "mov [rsp + 0x30], rbp",
        "mov rax, rsp",
        "mov rsp, rdi",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 0x04]",
        "mov r12, [rsp + 0x08]",
        "mov r13, [rsp + 0x10]",
        "mov r14, [rsp + 0x18]",
        "mov r15, [rsp + 0x20]",
        "mov rbx, [rsp + 0x28]",
        "mov rbp, [rsp + 0x30]",
        // Leave the target's return address in place: the fixup's `ret`
        // resumes the target with the fixup's result in rax:rdx.
        "lea rsp, [rsp + 0x38]",
        "mov rdx, rsi",
        "mov rdi, rax",
        "jmp r8",
    );
}
