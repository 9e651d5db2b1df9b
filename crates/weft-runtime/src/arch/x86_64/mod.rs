//! x86_64 context switching implementation
//!
//! Uses naked functions for the switch itself.
//! Stable in Rust 1.88+

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod ms;
        pub use ms::{context_fixup, jump_context, make_context, ontop_context};
    } else {
        mod sysv;
        pub use sysv::{jump_context, make_context, ontop_context};
    }
}

/// Default MXCSR: all exceptions masked, round to nearest
pub(crate) const MXCSR_DEFAULT: u32 = 0x1F80;
