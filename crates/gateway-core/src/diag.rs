//! Leveled diagnostic print macros.
//!
//! Adapted from the runtime's kernel-style `kprint` macros. The context tag
//! carries a component name and a call reference instead of a worker/green-
//! thread id, since every task here is a named, long-lived component (a LAPD
//! engine, an NFAS group, a call-control instance) rather than a scheduled
//! green thread.
//!
//! # Environment Variables
//!
//! - `GW_FLUSH_EPRINT=1` - flush stderr after each line (useful when a crash
//!   might otherwise eat buffered output)
//! - `GW_LOG_LEVEL=<level>` - off|error|warn|info|debug|trace (or 0-5)
//! - `GW_DIAG_TIME=1` - prefix each line with a nanosecond timestamp
//!
//! # Output Format
//!
//! Without timestamp: `[LEVEL] [component:call] message`
//! With timestamp:    `[LEVEL] [<ns>] [component:call] message`
//!
//! # Usage
//!
//! ```ignore
//! use gateway_core::{loginfo, logwarn};
//! use gateway_core::diag::set_component;
//!
//! set_component("lapd");
//! loginfo!("link established");
//! logwarn!("T200 expired, retry {}", 3);
//! ```

use crate::env::env_get_bool;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

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

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static TIME_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize from environment variables. Called automatically on first log,
/// but can be called explicitly for deterministic startup ordering.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    START_TIME.get_or_init(Instant::now);

    FLUSH_ENABLED.store(env_get_bool("GW_FLUSH_EPRINT", false), Ordering::Relaxed);
    TIME_ENABLED.store(env_get_bool("GW_DIAG_TIME", false), Ordering::Relaxed);

    if let Ok(val) = std::env::var("GW_LOG_LEVEL") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Info,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
pub fn flush_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn time_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    TIME_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn set_time_enabled(enabled: bool) {
    TIME_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level as u8 <= log_level() as u8
}

#[inline]
pub fn elapsed_ns() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

thread_local! {
    static COMPONENT: std::cell::RefCell<Option<&'static str>> = const { std::cell::RefCell::new(None) };
    static CALL_ID: std::cell::Cell<Option<u64>> = const { std::cell::Cell::new(None) };
}

/// Tag this thread's log lines with a component name (e.g. `"lapd"`,
/// `"nfas"`, `"q931"`). Set once per task at startup.
pub fn set_component(name: &'static str) {
    COMPONENT.with(|c| *c.borrow_mut() = Some(name));
}

pub fn clear_component() {
    COMPONENT.with(|c| *c.borrow_mut() = None);
}

/// Tag this thread's log lines with the call reference currently being
/// processed. Cleared when the task moves on to unrelated work.
pub fn set_call_id(id: u64) {
    CALL_ID.with(|c| c.set(Some(id)));
}

pub fn clear_call_id() {
    CALL_ID.with(|c| c.set(None));
}

pub fn get_component() -> Option<&'static str> {
    COMPONENT.with(|c| *c.borrow())
}

pub fn get_call_id() -> Option<u64> {
    CALL_ID.with(|c| c.get())
}

fn format_context() -> String {
    let component = get_component().unwrap_or("----");
    match get_call_id() {
        Some(id) => format!("[{}:{}]", component, id),
        None => format!("[{}:--]", component),
    }
}

#[doc(hidden)]
pub fn _log_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();

    let _ = write!(handle, "{} ", level.prefix());
    if time_enabled() {
        let _ = write!(handle, "[{}] ", elapsed_ns());
    }
    let _ = write!(handle, "{} ", format_context());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");

    if flush_enabled() {
        let _ = handle.flush();
    }
}

#[macro_export]
macro_rules! logerr {
    ($($arg:tt)*) => {{
        $crate::diag::_log_impl($crate::diag::LogLevel::Error, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! logwarn {
    ($($arg:tt)*) => {{
        $crate::diag::_log_impl($crate::diag::LogLevel::Warn, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! loginfo {
    ($($arg:tt)*) => {{
        $crate::diag::_log_impl($crate::diag::LogLevel::Info, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! logdebug {
    ($($arg:tt)*) => {{
        $crate::diag::_log_impl($crate::diag::LogLevel::Debug, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! logtrace {
    ($($arg:tt)*) => {{
        $crate::diag::_log_impl($crate::diag::LogLevel::Trace, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn level_from_u8() {
        assert_eq!(LogLevel::from_u8(0), LogLevel::Off);
        assert_eq!(LogLevel::from_u8(1), LogLevel::Error);
        assert_eq!(LogLevel::from_u8(4), LogLevel::Debug);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn component_and_call_context() {
        assert_eq!(get_component(), None);
        assert_eq!(get_call_id(), None);

        set_component("lapd");
        set_call_id(42);
        assert_eq!(get_component(), Some("lapd"));
        assert_eq!(get_call_id(), Some(42));

        clear_component();
        clear_call_id();
        assert_eq!(get_component(), None);
        assert_eq!(get_call_id(), None);
    }

    #[test]
    fn elapsed_ns_advances() {
        let t1 = elapsed_ns();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let t2 = elapsed_ns();
        assert!(t2 > t1);
    }

    #[test]
    fn macros_compile() {
        set_log_level(LogLevel::Off);
        logerr!("error {}", "msg");
        logwarn!("warn");
        loginfo!("info");
        logdebug!("debug");
        logtrace!("trace");
    }
}
