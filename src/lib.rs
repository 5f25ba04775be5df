//! # Splitlog
//!
//! A self-rotating file logger with size- and day-based splitting.
//!
//! ## Features
//!
//! - Append-only writes with timestamp and prefix, safe for concurrent callers
//! - Size splitting into a cycle of numbered backups (`app.log.1` ..)
//! - Daily splitting into dated backups (`app.log.2026-08-30`)
//! - A background monitor thread that checks for due rotations, stopped
//!   cleanly when the logger is dropped
//!
//! ## Example
//!
//! ```rust,no_run
//! use splitlog::{FileLogger, SizeUnit, logf};
//!
//! let logger = FileLogger::by_size("logs", "app.log", "[app] ", 10, 50, SizeUnit::Mb)?;
//! logf!(logger, "listening on port {}", 8080)?;
//! # Ok::<(), splitlog::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod error;
mod monitor;
pub mod rotation;
pub mod writer;

pub use builder::FileLoggerBuilder;
pub use config::LoggerConfig;
pub use error::{Error, Result};
pub use rotation::{RotationPolicy, SizeUnit};
pub use writer::{DEFAULT_SCAN_INTERVAL, FileLogger};

/// Append a formatted line to a [`FileLogger`], printf style.
///
/// Expands to a call to [`FileLogger::log`] with the formatted arguments.
#[macro_export]
macro_rules! logf {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log(::core::format_args!($($arg)*))
    };
}
