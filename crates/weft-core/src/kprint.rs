//! Leveled stderr logging for weft
//!
//! One line per call, written under the stderr lock so lines from
//! different threads never interleave. Lines emitted while a stackful
//! fiber runs on the current thread carry that fiber's id:
//!
//! ```text
//! [DEBUG] [f:7] resume 0 -> 7
//! [WARN]  fiber observer panicked in on_detach for fiber 7
//! ```
//!
//! # Environment Variables
//!
//! - `WEFT_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//! - `WEFT_FLUSH_EPRINT=1` - flush stderr after each line (useful when a
//!   crash inside a switch would otherwise lose buffered output)
//!
//! ```ignore
//! use weft_core::{kinfo, kdebug};
//!
//! kinfo!("executor started");
//! kdebug!("resuming fiber {}", id);
//! ```

use std::cell::Cell;
use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Log levels
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit; `None` for anything else
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

/// Sentinel for "read `WEFT_LOG_LEVEL` on first use"
const LEVEL_UNSET: u8 = u8::MAX;

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNSET);
static FLUSH: OnceLock<bool> = OnceLock::new();

/// No fiber running on this thread
const NO_FIBER: u64 = u64::MAX;

thread_local! {
    static FIBER_TAG: Cell<u64> = const { Cell::new(NO_FIBER) };
}

/// Read `WEFT_LOG_LEVEL` and `WEFT_FLUSH_EPRINT` now instead of on the
/// first log line. A level set with [`set_log_level`] is kept.
pub fn init() {
    let _ = log_level();
    let _ = flush_enabled();
}

fn flush_enabled() -> bool {
    *FLUSH.get_or_init(|| {
        std::env::var("WEFT_FLUSH_EPRINT")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    })
}

#[inline]
pub fn log_level() -> LogLevel {
    let raw = LOG_LEVEL.load(Ordering::Relaxed);
    if raw != LEVEL_UNSET {
        return LogLevel::from_u8(raw);
    }
    let level = std::env::var("WEFT_LOG_LEVEL")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
        .unwrap_or(LogLevel::Info);
    // A concurrent set_log_level wins over the environment
    let _ = LOG_LEVEL.compare_exchange(LEVEL_UNSET, level as u8, Ordering::Relaxed, Ordering::Relaxed);
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically (overrides the environment)
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Tag subsequent lines from this thread with a fiber id
#[inline]
pub fn set_fiber_tag(id: u64) {
    FIBER_TAG.with(|tag| tag.set(id));
}

/// Stop tagging lines from this thread
#[inline]
pub fn clear_fiber_tag() {
    FIBER_TAG.with(|tag| tag.set(NO_FIBER));
}

fn fiber_tag() -> Option<u64> {
    // try_with: logging during thread teardown must not panic
    FIBER_TAG
        .try_with(|tag| tag.get())
        .ok()
        .filter(|&id| id != NO_FIBER)
}

fn write_line<W: Write>(
    out: &mut W,
    level: LogLevel,
    tag: Option<u64>,
    args: fmt::Arguments<'_>,
) -> std::io::Result<()> {
    match tag {
        Some(id) => write!(out, "{} [f:{}] ", level.prefix(), id)?,
        None => write!(out, "{} ", level.prefix())?,
    }
    out.write_fmt(args)?;
    out.write_all(b"\n")
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write_line(&mut handle, level, fiber_tag(), args);
    if flush_enabled() {
        let _ = handle.flush();
    }
}

// ============================================================================
// Public Macros
// ============================================================================

/// Error level log (shown unless logging is off)
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Error,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Warn,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Info,
            format_args!($($arg)*)
        );
    }};
}

/// Debug level log (switch and executor tracing when `WEFT_DEBUG` is set)
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Debug,
            format_args!($($arg)*)
        );
    }};
}

/// Trace level log (fiber lifecycle events land here)
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Trace,
            format_args!($($arg)*)
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_ordered() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" 1 "), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_fiber_tag() {
        assert_eq!(fiber_tag(), None);
        set_fiber_tag(12);
        assert_eq!(fiber_tag(), Some(12));
        clear_fiber_tag();
        assert_eq!(fiber_tag(), None);
    }

    #[test]
    fn test_line_format() {
        let mut out = Vec::new();
        write_line(&mut out, LogLevel::Debug, Some(7), format_args!("resume {} -> {}", 0, 7)).unwrap();
        write_line(&mut out, LogLevel::Warn, None, format_args!("idle")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[DEBUG] [f:7] resume 0 -> 7\n[WARN]  idle\n"
        );
    }

    #[test]
    fn test_macros_compile() {
        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));

        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace");
    }
}
