//! Switching between fibers
//!
//! Every switch goes through `ontop_context` with a [`SwitchRecord`] built
//! on the suspending fiber's stack. The fixup stores the suspended context
//! into `record.former` once it is known; a fiber starting for the first
//! time finds itself in `record.latter`.

use super::FiberInner;
use crate::arch::{jump_context, ontop_context, Transfer, CONTEXT_FIXUP};
use crate::tls;
use crate::telemetry;
use std::mem::offset_of;
use weft_core::status::FiberStatus;

/// One switch: who is being suspended and who takes over
///
/// Lives on the former's stack for the duration of the switch.
#[repr(C)]
pub(super) struct SwitchRecord {
    pub(super) former: *const FiberInner,
    pub(super) latter: *const FiberInner,
}

// The context fixup dereferences the payload twice to reach the context
// slot: record -> former -> context.
const _: () = assert!(offset_of!(SwitchRecord, former) == 0);
const _: () = assert!(offset_of!(FiberInner, context) == 0);

/// Suspend `former` and continue `latter`.
///
/// Returns once some fiber switches back into `former`.
///
/// # Safety
///
/// `former` must be the fiber whose context is live on this thread and
/// `latter` must hold a valid saved context. Both must outlive the switch.
pub(super) unsafe fn switch(former: &FiberInner, latter: &FiberInner) {
    debug_assert!(!latter.context.get().is_null(), "fiber {} has no saved context", latter.id);
    let mut record = SwitchRecord { former, latter };

    ontop_context(
        latter.context.get(),
        &mut record as *mut SwitchRecord as *mut u8,
        CONTEXT_FIXUP,
    );

    // Running again on our own stack
    tls::set_current(former);
}

/// Entry point of every fiber's callable.
///
/// Runs the callable to completion, then hands control to the most
/// recent resumer. A panic escaping the callable aborts the process.
pub(super) extern "C" fn fiber_main(t: Transfer) -> ! {
    // SAFETY: the first switch into a fresh context carries the record
    // built by `switch`, still alive on the suspended former's stack.
    let me = unsafe { &*(*(t.data as *const SwitchRecord)).latter };
    tls::set_current(me);

    if let Some(callable) = me.callable.take() {
        callable();
    }

    me.status.set(FiberStatus::Ended);
    telemetry::detach(me.id);

    // SAFETY: resume/yield_to always name a resumer before running us
    let resumer = unsafe { &*me.resumer.get() };
    resumer.status.set(FiberStatus::Running);
    tls::set_current(resumer);

    // Our own context is discarded; reset builds a fresh one.
    unsafe {
        jump_context(resumer.context.get(), std::ptr::null_mut());
    }
    unreachable!("ended fiber {} was resumed", me.id);
}
