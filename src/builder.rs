//! Builder for loggers with non-default settings.
//!
//! # Example
//!
//! ```rust,no_run
//! use splitlog::FileLogger;
//! use std::time::Duration;
//!
//! let logger = FileLogger::builder("logs", "app.log")
//!     .with_prefix("[app] ")
//!     .split_by_size(10 * 1024 * 1024, 5)
//!     .with_scan_interval(Duration::from_secs(10))
//!     .build()
//!     .expect("failed to create logger");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::rotation::{DEFAULT_MAX_BACKUPS, DEFAULT_MAX_SIZE};
use crate::writer::DEFAULT_SCAN_INTERVAL;
use crate::{FileLogger, Result, RotationPolicy};

/// A builder for [`FileLogger`].
///
/// Starts from the default preset (size splitting, 10 backups of 50 MB,
/// no prefix, 60 s scan interval) and overrides pieces of it.
#[derive(Debug, Clone)]
pub struct FileLoggerBuilder {
    dir: PathBuf,
    file_name: String,
    prefix: String,
    policy: RotationPolicy,
    scan_interval: Duration,
}

impl FileLoggerBuilder {
    pub(crate) fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            prefix: String::new(),
            policy: RotationPolicy::size(DEFAULT_MAX_SIZE, DEFAULT_MAX_BACKUPS),
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    /// Set the line prefix written before the timestamp.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Split by size: `max_size` in bytes, cycling through `max_backups`
    /// numbered backup files.
    pub fn split_by_size(mut self, max_size: u64, max_backups: usize) -> Self {
        self.policy = RotationPolicy::size(max_size, max_backups);
        self
    }

    /// Split when the local calendar day changes.
    pub fn split_daily(mut self) -> Self {
        self.policy = RotationPolicy::daily();
        self
    }

    /// Set the rotation policy directly.
    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the interval between background rotation checks.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Open the logger and start its background monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the log directory
    /// or file cannot be created, or the monitor thread cannot be spawned.
    pub fn build(self) -> Result<FileLogger> {
        FileLogger::open(
            self.dir,
            self.file_name,
            self.prefix,
            self.policy,
            self.scan_interval,
        )
    }
}
