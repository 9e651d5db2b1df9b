//! Microsoft x64 backend (Windows)
//!
//! A 16-byte struct is returned through a hidden pointer in rcx and passed
//! by address, so `Transfer` never travels in registers here. The switch
//! functions store it through the target's saved return pointer, and the
//! fixup receives a pointer to a scratch copy on the target's stack.
//!
//! Frame saved on the suspended stack, `fctx` points at its base:
//!
//! ```text
//! 0x000  xmm6 .. xmm15
//! 0x0a0  TIB fiber data
//! 0x0a8  TIB deallocation stack
//! 0x0b0  TIB stack limit
//! 0x0b8  TIB stack base
//! 0x0c0  mxcsr (u32) | x87 control word (u16)
//! 0x0c8  r12, r13, r14, r15, rdi, rsi, rbx, rbp
//! 0x108  hidden return pointer of the suspended call
//! 0x110  scratch Transfer { fctx, data }
//! 0x120  return address
//! ```

use super::MXCSR_DEFAULT;
use crate::arch::{align_down, Context, EntryFn, FixupFn, Transfer};
use std::arch::naked_asm;

/// x87 control word: double precision, all exceptions masked
const FPU_CW_DEFAULT: u16 = 0x027F;

const FRAME_SIZE: usize = 0x128;

/// Build the initial frame for a fresh stack.
///
/// # Safety
///
/// `top` must be the highest address of a writable region of at least
/// `size` bytes, and `size` must exceed the frame.
pub unsafe fn make_context(top: *mut u8, size: usize, entry: EntryFn) -> Context {
    debug_assert!(size > FRAME_SIZE + 0x10);

    let aligned = align_down(top);
    // rsp is 8 mod 16 inside a call, so the frame base must be too
    let sp = aligned - FRAME_SIZE - 0x10;
    let frame = sp as *mut u8;
    std::ptr::write_bytes(frame, 0, FRAME_SIZE + 0x10);

    let bottom = (top as usize).saturating_sub(size);
    (frame.add(0xa8) as *mut usize).write(bottom);
    (frame.add(0xb0) as *mut usize).write(bottom);
    (frame.add(0xb8) as *mut usize).write(aligned);
    (frame.add(0xc0) as *mut u32).write(MXCSR_DEFAULT);
    (frame.add(0xc4) as *mut u16).write(FPU_CW_DEFAULT);
    (frame.add(0xc8) as *mut usize).write(entry as usize);
    // No caller yet: the first switch writes the Transfer into scratch
    (frame.add(0x108) as *mut usize).write(sp + 0x110);
    (frame.add(0x120) as *mut usize).write(entry_trampoline as usize);

    Context::from_ptr(frame)
}

/// First code run on a fresh context.
///
/// rax points at the incoming `Transfer`, r12 holds the entry function.
/// The scratch copy sits just below rsp, so it is read before anything
/// else touches the stack.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov r8, [rax]",
        "mov r9, [rax + 0x08]",
        // 0x20 shadow space plus the by-address Transfer argument
        "sub rsp, 0x30",
        "mov [rsp + 0x20], r8",
        "mov [rsp + 0x28], r9",
        "lea rcx, [rsp + 0x20]",
        "call r12",
        "ud2",
    );
}

/// Store the suspended context into the slot the payload names.
///
/// Same contract as the portable fixup, but takes the scratch `Transfer`
/// by address in rcx.
#[unsafe(naked)]
pub unsafe extern "C" fn context_fixup(_t: *mut Transfer) {
    naked_asm!(
        // payload: pointer to the context slot pointer
        "mov rax, [rcx + 0x08]",
        "mov rax, [rax]",
        "mov r9, [rcx]",
        "mov [rax], r9",
        "ret",
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
    // rcx = hidden return pointer, rdx = to, r8 = data
    naked_asm!(
        "lea rsp, [rsp - 0x120]",
        "movups [rsp + 0x00], xmm6",
        "movups [rsp + 0x10], xmm7",
        "movups [rsp + 0x20], xmm8",
        "movups [rsp + 0x30], xmm9",
        "movups [rsp + 0x40], xmm10",
        "movups [rsp + 0x50], xmm11",
        "movups [rsp + 0x60], xmm12",
        "movups [rsp + 0x70], xmm13",
        "movups [rsp + 0x80], xmm14",
        "movups [rsp + 0x90], xmm15",
        "mov r10, qword ptr gs:[0x30]",
        "mov rax, [r10 + 0x20]",
        "mov [rsp + 0xa0], rax",
        "mov rax, [r10 + 0x1478]",
        "mov [rsp + 0xa8], rax",
        "mov rax, [r10 + 0x10]",
        "mov [rsp + 0xb0], rax",
        "mov rax, [r10 + 0x08]",
        "mov [rsp + 0xb8], rax",
        "stmxcsr dword ptr [rsp + 0xc0]",
        "fnstcw word ptr [rsp + 0xc4]",
        "mov [rsp + 0xc8], r12",
        "mov [rsp + 0xd0], r13",
        "mov [rsp + 0xd8], r14",
        "mov [rsp + 0xe0], r15",
        "mov [rsp + 0xe8], rdi",
        "mov [rsp + 0xf0], rsi",
        "mov [rsp + 0xf8], rbx",
        "mov [rsp + 0x100], rbp",
        "mov [rsp + 0x108], rcx",
        "mov r10, rsp",
        // Load target's state
        "mov rsp, rdx",
        "movups xmm6, [rsp + 0x00]",
        "movups xmm7, [rsp + 0x10]",
        "movups xmm8, [rsp + 0x20]",
        "movups xmm9, [rsp + 0x30]",
        "movups xmm10, [rsp + 0x40]",
        "movups xmm11, [rsp + 0x50]",
        "movups xmm12, [rsp + 0x60]",
        "movups xmm13, [rsp + 0x70]",
        "movups xmm14, [rsp + 0x80]",
        "movups xmm15, [rsp + 0x90]",
        "mov r11, qword ptr gs:[0x30]",
        "mov rax, [rsp + 0xa0]",
        "mov [r11 + 0x20], rax",
        "mov rax, [rsp + 0xa8]",
        "mov [r11 + 0x1478], rax",
        "mov rax, [rsp + 0xb0]",
        "mov [r11 + 0x10], rax",
        "mov rax, [rsp + 0xb8]",
        "mov [r11 + 0x08], rax",
        "ldmxcsr dword ptr [rsp + 0xc0]",
        "fldcw word ptr [rsp + 0xc4]",
        "mov r12, [rsp + 0xc8]",
        "mov r13, [rsp + 0xd0]",
        "mov r14, [rsp + 0xd8]",
        "mov r15, [rsp + 0xe0]",
        "mov rdi, [rsp + 0xe8]",
        "mov rsi, [rsp + 0xf0]",
        "mov rbx, [rsp + 0xf8]",
        "mov rbp, [rsp + 0x100]",
        // Hand the Transfer back through the target's return pointer
        "mov rax, [rsp + 0x108]",
        "mov [rax], r10",
        "mov [rax + 0x08], r8",
        "lea rsp, [rsp + 0x120]",
        "ret",
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
    // rcx = hidden return pointer, rdx = to, r8 = data, r9 = fixup
    naked_asm!(
        "lea rsp, [rsp - 0x120]",
        "movups [rsp + 0x00], xmm6",
        "movups [rsp + 0x10], xmm7",
        "movups [rsp + 0x20], xmm8",
        "movups [rsp + 0x30], xmm9",
        "movups [rsp + 0x40], xmm10",
        "movups [rsp + 0x50], xmm11",
        "movups [rsp + 0x60], xmm12",
        "movups [rsp + 0x70], xmm13",
        "movups [rsp + 0x80], xmm14",
        "movups [rsp + 0x90], xmm15",
        "mov r10, qword ptr gs:[0x30]",
        "mov rax, [r10 + 0x20]",
        "mov [rsp + 0xa0], rax",
        "mov rax, [r10 + 0x1478]",
        "mov [rsp + 0xa8], rax",
        "mov rax, [r10 + 0x10]",
        "mov [rsp + 0xb0], rax",
        "mov rax, [r10 + 0x08]",
        "mov [rsp + 0xb8], rax",
        "stmxcsr dword ptr [rsp + 0xc0]",
        "fnstcw word ptr [rsp + 0xc4]",
        "mov [rsp + 0xc8], r12",
        "mov [rsp + 0xd0], r13",
        "mov [rsp + 0xd8], r14",
        "mov [rsp + 0xe0], r15",
        "mov [rsp + 0xe8], rdi",
        "mov [rsp + 0xf0], rsi",
        "mov [rsp + 0xf8], rbx",
        "mov [rsp + 0x100], rbp",
        "mov [rsp + 0x108], rcx",
        "mov r10, rsp",
        "mov rsp, rdx",
        "movups xmm6, [rsp + 0x00]",
        "movups xmm7, [rsp + 0x10]",
        "movups xmm8, [rsp + 0x20]",
        "movups xmm9, [rsp + 0x30]",
        "movups xmm10, [rsp + 0x40]",
        "movups xmm11, [rsp + 0x50]",
        "movups xmm12, [rsp + 0x60]",
        "movups xmm13, [rsp + 0x70]",
        "movups xmm14, [rsp + 0x80]",
        "movups xmm15, [rsp + 0x90]",
        "mov r11, qword ptr gs:[0x30]",
        "mov rax, [rsp + 0xa0]",
        "mov [r11 + 0x20], rax",
        "mov rax, [rsp + 0xa8]",
        "mov [r11 + 0x1478], rax",
        "mov rax, [rsp + 0xb0]",
        "mov [r11 + 0x10], rax",
        "mov rax, [rsp + 0xb8]",
        "mov [r11 + 0x08], rax",
        "ldmxcsr dword ptr [rsp + 0xc0]",
        "fldcw word ptr [rsp + 0xc4]",
        "mov r12, [rsp + 0xc8]",
        "mov r13, [rsp + 0xd0]",
        "mov r14, [rsp + 0xd8]",
        "mov r15, [rsp + 0xe0]",
        "mov rdi, [rsp + 0xe8]",
        "mov rsi, [rsp + 0xf0]",
        "mov rbx, [rsp + 0xf8]",
        "mov rbp, [rsp + 0x100]",
        // Run the fixup on the scratch Transfer
        "mov [rsp + 0x110], r10",
        "mov [rsp + 0x118], r8",
        "lea rcx, [rsp + 0x110]",
        "sub rsp, 0x28",
        "call r9",
        "add rsp, 0x28",
        // Copy the (possibly rewritten) scratch out to the target
        "mov rax, [rsp + 0x108]",
        "mov r10, [rsp + 0x110]",
        "mov [rax], r10",
        "mov r10, [rsp + 0x118]",
        "mov [rax + 0x08], r10",
        "lea rsp, [rsp + 0x120]",
        "ret",
    );
}
