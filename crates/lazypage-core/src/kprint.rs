//! Leveled stderr diagnostics for lazypage
//!
//! Every line is built in full and then written with a single call, so
//! output from the fault-handler thread never interleaves mid-line with the
//! driver's. Lines are tagged with the emitting thread's name.
//!
//! # Environment Variables
//!
//! - `LAZYPAGE_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//! - `LAZYPAGE_FLUSH_EPRINT=1` - flush stderr after each line
//!
//! Both are read once, on the first line logged. [`set_log_level`] wins
//! over the environment if it runs first.
//!
//! ```ignore
//! use lazypage_core::{kdebug, kerror, kinfo};
//!
//! kinfo!("Address returned by mmap() = {:#x}", base);
//! kdebug!("{}", event);
//! kerror!("{}", err);
//! ```

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

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

const LEVELS: [LogLevel; 6] = [
    LogLevel::Off,
    LogLevel::Error,
    LogLevel::Warn,
    LogLevel::Info,
    LogLevel::Debug,
    LogLevel::Trace,
];

impl LogLevel {
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Accepts a level name in any case, or its number.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return LEVELS.get(n).copied();
        }
        LEVELS.iter().copied().find(|l| l.name().eq_ignore_ascii_case(s))
    }

    fn tag(self) -> &'static str {
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

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Not yet decided: consult the environment on first use.
const LEVEL_UNSET: u8 = u8::MAX;

static LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNSET);
static FLUSH: OnceLock<bool> = OnceLock::new();

fn level_from_env() -> LogLevel {
    std::env::var("LAZYPAGE_LOG_LEVEL")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
        .unwrap_or(LogLevel::Info)
}

pub fn log_level() -> LogLevel {
    let raw = LEVEL.load(Ordering::Relaxed);
    if let Some(&level) = LEVELS.get(raw as usize) {
        return level;
    }
    let level = level_from_env();
    // A concurrent set_log_level keeps its value.
    match LEVEL.compare_exchange(LEVEL_UNSET, level as u8, Ordering::Relaxed, Ordering::Relaxed) {
        Ok(_) => level,
        Err(set) => LEVELS.get(set as usize).copied().unwrap_or(level),
    }
}

pub fn set_log_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

fn flush_each_line() -> bool {
    *FLUSH.get_or_init(|| crate::env::env_get_bool("LAZYPAGE_FLUSH_EPRINT", false))
}

/// `"[INFO]  [fault-handler] message\n"`; no tag for untagged lines.
fn render(level: Option<LogLevel>, thread: &str, args: fmt::Arguments<'_>) -> String {
    match level {
        Some(level) => format!("{} [{}] {}\n", level.tag(), thread, args),
        None => format!("{}\n", args),
    }
}

fn emit(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = err.write_all(line.as_bytes());
    if flush_each_line() {
        let _ = err.flush();
    }
}

#[doc(hidden)]
pub fn __emit(level: Option<LogLevel>, args: fmt::Arguments<'_>) {
    if let Some(level) = level {
        if !level_enabled(level) {
            return;
        }
    }
    let current = std::thread::current();
    emit(&render(level, current.name().unwrap_or("?"), args));
}

/// Untagged line to stderr, shown at every level.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint::__emit(None, format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::kprint::__emit(None, format_args!($($arg)*))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __klog {
    ($level:ident, $($arg:tt)*) => {
        $crate::kprint::__emit(Some($crate::kprint::LogLevel::$level), format_args!($($arg)*))
    };
}

/// Shown unless logging is off.
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::__klog!(Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::__klog!(Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::__klog!(Info, $($arg)*) };
}

/// One line per fault lands here.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::__klog!(Debug, $($arg)*) };
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::__klog!(Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" warn\n"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("2"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("6"), None);
        assert_eq!(LogLevel::parse("loud"), None);
        for level in LEVELS {
            assert_eq!(LogLevel::parse(&level.to_string()), Some(level));
        }
    }

    #[test]
    fn test_render_tags_thread() {
        let line = render(Some(LogLevel::Warn), "fault-handler", format_args!("page {}", 3));
        assert_eq!(line, "[WARN]  [fault-handler] page 3\n");
        assert_eq!(render(None, "main", format_args!("done")), "done\n");
    }

    #[test]
    fn test_level_filter_and_macros() {
        set_log_level(LogLevel::Warn);
        assert!(level_enabled(LogLevel::Error));
        assert!(level_enabled(LogLevel::Warn));
        assert!(!level_enabled(LogLevel::Info));
        assert!(!level_enabled(LogLevel::Off));

        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));
        kprintln!();
        kprintln!("fault {}", 1);
        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace");
    }
}
