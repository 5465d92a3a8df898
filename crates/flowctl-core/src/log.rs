//! Minimal structured debug logging
//!
//! flowctl has no southbound daemon's logging configuration to hook
//! into (out of scope), so it carries its own small leveled logger in
//! the same spirit as the teacher's `kprint` module: a global level set
//! once from the environment (`FLOWCTL_LOG_LEVEL`), and macros that
//! stamp each line with a level tag. Timing logs for `run()` and each
//! change-handler invocation (spec.md §4.3 "Statistics") use
//! [`timed`] and are only emitted when the level is `Debug` or finer.

use crate::env::env_get;
use std::sync::atomic::{AtomicU8, Ordering};
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
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN ",
            LogLevel::Info => "INFO ",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Set the active log level. Call once at startup; the default (if
/// never called) is read lazily from `FLOWCTL_LOG_LEVEL` on first use.
pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current log level, initialized from `FLOWCTL_LOG_LEVEL` the first
/// time logging is used if `set_level` was never called explicitly.
pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn init_from_env() {
    let n: u8 = env_get("FLOWCTL_LOG_LEVEL", LogLevel::Info as u8);
    LEVEL.store(n, Ordering::Relaxed);
}

#[doc(hidden)]
pub fn log_enabled(level: LogLevel) -> bool {
    (LEVEL.load(Ordering::Relaxed)) >= (level as u8)
}

#[doc(hidden)]
pub fn log_prefix(level: LogLevel) -> &'static str {
    level.prefix()
}

/// Run `f`, and if debug logging is enabled, log how long it took under
/// `what` (e.g. a node name or "handler:<input>->`<node>`").
pub fn timed<T>(what: &str, f: impl FnOnce() -> T) -> T {
    if !log_enabled(LogLevel::Debug) {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    crate::ctl_debug!("{what} took {:?}", elapsed);
    result
}

#[macro_export]
macro_rules! ctl_log {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::log::log_enabled($level) {
            eprintln!("[{}] {}", $crate::log::log_prefix($level), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! ctl_error {
    ($($arg:tt)*) => { $crate::ctl_log!($crate::log::LogLevel::Error, $($arg)*) };
}

#[macro_export]
macro_rules! ctl_warn {
    ($($arg:tt)*) => { $crate::ctl_log!($crate::log::LogLevel::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! ctl_info {
    ($($arg:tt)*) => { $crate::ctl_log!($crate::log::LogLevel::Info, $($arg)*) };
}

#[macro_export]
macro_rules! ctl_debug {
    ($($arg:tt)*) => { $crate::ctl_log!($crate::log::LogLevel::Debug, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_roundtrip() {
        set_level(LogLevel::Trace);
        assert_eq!(level(), LogLevel::Trace);
        assert!(log_enabled(LogLevel::Debug));
        set_level(LogLevel::Error);
        assert!(!log_enabled(LogLevel::Info));
        set_level(LogLevel::Info);
    }

    #[test]
    fn timed_runs_closure_regardless_of_level() {
        set_level(LogLevel::Off);
        let v = timed("noop", || 1 + 1);
        assert_eq!(v, 2);
        set_level(LogLevel::Info);
    }
}
