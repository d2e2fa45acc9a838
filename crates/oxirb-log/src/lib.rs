//! Leveled diagnostic logging for the `oxirb` object runtime.
//!
//! A small, dependency-free logger: one global level stored in an atomic,
//! `module_path!()` captured at every call site, and colored
//! `[LEVEL] target: message` lines written to stderr so that program output
//! routed through the runtime's own sinks is never interleaved with
//! diagnostics.
//!
//! # Example
//!
//! ```
//! use oxirb_log::{debug, info, warn, Level};
//!
//! oxirb_log::set_level(Level::Debug);
//!
//! info!("booted {} core classes", 18);
//! debug!("ancestors of {}: {:?}", "Integer", ["Integer", "Numeric", "Object"]);
//! warn!("cannot load such file -- {}", "missing/feature");
//! ```
//!
//! The level can also be taken from the environment:
//!
//! ```
//! // OXIRB_LOG=trace cargo test
//! oxirb_log::init_from_env();
//! ```

use std::fmt::{self, Arguments};
use std::str::FromStr;
use std::sync::Once;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted by [`init_from_env`].
pub const ENV_VAR: &str = "OXIRB_LOG";

/// Severity of a log record.
///
/// Lower numeric values are more severe; a logger set to `Info` lets
/// `Error`, `Warn` and `Info` through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Failures that abort an operation.
    Error = 0,
    /// Degraded behavior the caller may want to know about.
    Warn = 1,
    /// High-level lifecycle events.
    Info = 2,
    /// Structural changes to the object model.
    Debug = 3,
    /// Cache misses and per-dispatch detail.
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Upper-case name used in the record prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, case-insensitively. `warning` is accepted as an
    /// alias of `warn`.
    ///
    /// ```
    /// use oxirb_log::Level;
    ///
    /// assert_eq!("debug".parse::<Level>(), Ok(Level::Debug));
    /// assert_eq!("WARNING".parse::<Level>(), Ok(Level::Warn));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// The global logger. Obtain it with [`get_logger`].
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the minimum level that will be emitted.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Whether a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: Logger = Logger::new(Level::Warn);
static ENV_INIT: Once = Once::new();

/// Returns the process-wide logger. The initial level is `Warn`.
pub fn get_logger() -> &'static Logger {
    &LOGGER
}

/// Sets the minimum level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum level from a level name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` is not a level name.
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Applies `OXIRB_LOG` to the global logger, once per process.
///
/// Unset or unparsable values leave the level untouched.
pub fn init_from_env() {
    ENV_INIT.call_once(|| {
        if let Ok(raw) = std::env::var(ENV_VAR) {
            if let Ok(level) = raw.parse() {
                set_level(level);
            }
        }
    });
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    const RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    eprintln!("{}[{}]{RESET} {target}: {args}", level.color_code(), level);
}

/// Logs at an explicit level.
///
/// ```
/// use oxirb_log::{log, Level};
///
/// log!(level: Level::Info, "dispatch cache holds {} entries", 3);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}
