use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use time::macros::format_description;
use time::{Date, OffsetDateTime, format_description::FormatItem};

use crate::builder::FileLoggerBuilder;
use crate::monitor::Monitor;
use crate::rotation::{DEFAULT_MAX_BACKUPS, RotationPolicy, SizeUnit};
use crate::{Error, Result};

/// Default interval between background rotation checks.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

const TIMESTAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:6]");

const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// State of the active log file.
///
/// All three fields are only ever mutated while holding the write half of
/// the owning [`LoggerCore`]'s lock.
struct LogState {
    /// The open handle for the active file, rebuilt on every rotation.
    file: Option<File>,
    /// Cyclic backup slot counter, size mode only.
    backup_index: usize,
    /// Calendar day the active file was opened for, daily mode only.
    period_start: Date,
}

/// Shared logger internals, owned jointly by the [`FileLogger`] handle and
/// its background monitor thread.
pub(crate) struct LoggerCore {
    dir: PathBuf,
    file_name: String,
    prefix: String,
    policy: RotationPolicy,
    state: RwLock<LogState>,
}

/// A file logger that splits its backing file by size or by calendar day.
///
/// Each logger owns exactly one active file and a background monitor thread
/// that re-evaluates the rotation policy on a fixed cadence. Rotation never
/// happens on the write path: [`FileLogger::log`] only appends.
///
/// Dropping the logger (or calling [`FileLogger::shutdown`]) stops and joins
/// the monitor thread.
pub struct FileLogger {
    core: Arc<LoggerCore>,
    monitor: Monitor,
}

impl FileLogger {
    /// Create a size-split logger with the default preset: 10 backups of
    /// 50 MB each, no prefix.
    pub fn with_defaults(
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> Result<Self> {
        Self::by_size(dir, file_name, "", DEFAULT_MAX_BACKUPS, 50, SizeUnit::Mb)
    }

    /// Create a logger that splits the active file once it reaches
    /// `threshold * unit` bytes, cycling through `max_backups` numbered
    /// backup files.
    pub fn by_size(
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
        prefix: impl Into<String>,
        max_backups: usize,
        threshold: u64,
        unit: SizeUnit,
    ) -> Result<Self> {
        Self::open(
            dir.into(),
            file_name.into(),
            prefix.into(),
            RotationPolicy::size_in(threshold, unit, max_backups),
            DEFAULT_SCAN_INTERVAL,
        )
    }

    /// Create a logger that splits the active file when the local calendar
    /// day changes, keeping one dated backup per past day.
    pub fn daily(
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        Self::open(
            dir.into(),
            file_name.into(),
            prefix.into(),
            RotationPolicy::daily(),
            DEFAULT_SCAN_INTERVAL,
        )
    }

    /// Start building a logger with non-default settings.
    pub fn builder(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> FileLoggerBuilder {
        FileLoggerBuilder::new(dir, file_name)
    }

    pub(crate) fn open(
        dir: PathBuf,
        file_name: String,
        prefix: String,
        policy: RotationPolicy,
        scan_interval: Duration,
    ) -> Result<Self> {
        if file_name.is_empty() {
            return Err(Error::Config("file name must not be empty".to_string()));
        }
        policy.validate()?;

        let core = Arc::new(LoggerCore::open(dir, file_name, prefix, policy)?);
        let monitor = Monitor::spawn(Arc::clone(&core), scan_interval)?;

        Ok(Self { core, monitor })
    }

    /// Append one formatted line, prefixed and timestamped.
    ///
    /// Call as `logger.log(format_args!("listening on {}", port))`, or use
    /// the [`logf!`](crate::logf) macro. The line lands in whichever file is
    /// active at the time of the call; a rotation concurrent with the write
    /// never drops it.
    pub fn log(&self, args: fmt::Arguments<'_>) -> Result<()> {
        self.core.log(args)
    }

    /// Append one plain line, prefixed and timestamped.
    pub fn write_line(&self, line: &str) -> Result<()> {
        self.core.log(format_args!("{}", line))
    }

    /// Re-evaluate the rotation policy and split the active file if due.
    ///
    /// The background monitor calls this on every tick; callers only need it
    /// for an explicit, immediate check.
    pub fn check_and_rotate(&self) -> Result<()> {
        self.core.check_and_rotate()
    }

    /// Flush the active file to disk.
    pub fn flush(&self) -> Result<()> {
        self.core.flush()
    }

    /// Path of the active log file.
    pub fn path(&self) -> PathBuf {
        self.core.active_path()
    }

    /// Stop the background monitor, flush, and close the logger.
    pub fn shutdown(mut self) -> Result<()> {
        self.monitor.stop();
        self.core.flush()
    }
}

impl LoggerCore {
    fn open(dir: PathBuf, file_name: String, prefix: String, policy: RotationPolicy) -> Result<Self> {
        create_log_dir(&dir)?;

        let backup_index = match &policy {
            RotationPolicy::Size { max_backups, .. } => {
                highest_backup_index(&dir, &file_name, *max_backups)
            }
            RotationPolicy::Daily => 0,
        };

        let active = dir.join(&file_name);
        let file = open_append(&active)?;

        let core = Self {
            dir,
            file_name,
            prefix,
            policy,
            state: RwLock::new(LogState {
                file: Some(file),
                backup_index,
                period_start: today_local(),
            }),
        };

        // A pre-existing oversized file is split before the first write.
        core.check_and_rotate()?;

        Ok(core)
    }

    pub(crate) fn active_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn backup_path_indexed(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}", self.file_name, index))
    }

    fn backup_path_dated(&self, date: Date) -> Result<PathBuf> {
        let suffix = date.format(DATE_FORMAT).map_err(time::error::Error::from)?;
        Ok(self.dir.join(format!("{}.{}", self.file_name, suffix)))
    }

    fn format_line(&self, args: fmt::Arguments<'_>) -> Result<String> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let ts = now
            .format(TIMESTAMP_FORMAT)
            .map_err(time::error::Error::from)?;
        Ok(format!("{}{} {}\n", self.prefix, ts, args))
    }

    pub(crate) fn log(&self, args: fmt::Arguments<'_>) -> Result<()> {
        let line = self.format_line(args)?;

        // The read lock only guards the handle reference; concurrent appends
        // through it are safe because the file is opened in append mode.
        // A poisoned lock still holds a usable handle, so recover it rather
        // than failing the caller's write.
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = state.file.as_ref() {
            let mut file = file;
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    pub(crate) fn check_and_rotate(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let today = today_local();
        if !self
            .policy
            .must_rotate(&self.active_path(), state.period_start, today)
        {
            return Ok(());
        }

        if let Err(err) = self.rotate(&mut state, today) {
            tracing::warn!(
                error = %err,
                path = %self.active_path().display(),
                "log rotation failed"
            );
            // Availability over archival: keep the active file writable even
            // when the split failed partway through.
            self.reopen_active(&mut state)?;
        }
        Ok(())
    }

    /// Perform the split. Always called with the write lock held.
    fn rotate(&self, state: &mut LogState, today: Date) -> Result<()> {
        let active = self.active_path();

        match &self.policy {
            RotationPolicy::Size { max_backups, .. } => {
                state.backup_index = state.backup_index % max_backups + 1;
                let backup = self.backup_path_indexed(state.backup_index);

                state.file.take();
                if backup.exists() {
                    // Oldest slot of the cycle is evicted.
                    fs::remove_file(&backup)?;
                }
                fs::rename(&active, &backup)?;
                state.file = Some(open_append(&active)?);

                tracing::debug!(backup = %backup.display(), "log file split by size");
            }
            RotationPolicy::Daily => {
                let backup = self.backup_path_dated(state.period_start)?;
                // Re-check under the lock: the day's backup may already exist.
                if backup.exists()
                    || !self.policy.must_rotate(&active, state.period_start, today)
                {
                    return Ok(());
                }

                state.file.take();
                if let Err(err) = fs::rename(&active, &backup) {
                    // Best effort: the active file keeps taking writes even
                    // if archiving it failed.
                    tracing::warn!(
                        error = %err,
                        backup = %backup.display(),
                        "log backup rename failed"
                    );
                }
                state.period_start = today;
                state.file = Some(open_append(&active)?);

                tracing::debug!(backup = %backup.display(), "log file split by day");
            }
        }
        Ok(())
    }

    fn reopen_active(&self, state: &mut LogState) -> Result<()> {
        if state.file.is_none() {
            state.file = Some(open_append(&self.active_path())?);
        }
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = state.file.as_ref() {
            file.sync_all()?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn set_period_start(&self, date: Date) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .period_start = date;
    }
}

/// Current local calendar day, falling back to UTC when the local offset
/// cannot be determined.
fn today_local() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// Index of the highest-numbered existing backup, so a restarted logger
/// resumes the cycle instead of resetting to slot 1.
fn highest_backup_index(dir: &Path, file_name: &str, max_backups: usize) -> usize {
    let mut index = 0;
    for i in 1..=max_backups {
        if dir.join(format!("{}.{}", file_name, i)).exists() {
            index = i;
        }
    }
    index
}

fn create_log_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)?;
    Ok(())
}

fn open_append(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true).create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o666);
    }
    opts.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    fn line_count(path: &Path) -> usize {
        read(path).lines().count()
    }

    #[test]
    fn test_writes_land_in_order_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::by_size(dir.path(), "app.log", "[app] ", 3, 1, SizeUnit::Mb)
            .expect("create logger");

        for i in 0..5 {
            logger.log(format_args!("message {}", i)).unwrap();
        }
        logger.flush().unwrap();

        let content = read(&logger.path());
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.starts_with("[app] "), "missing prefix: {}", line);
            assert!(line.ends_with(&format!("message {}", i)), "order broken: {}", line);
        }

        // Well under the threshold, so no backup appears.
        assert!(!dir.path().join("app.log.1").exists());
    }

    #[test]
    fn test_size_rotation_cycles_and_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::builder(dir.path(), "app.log")
            .split_by_size(64, 3)
            .build()
            .expect("create logger");

        for round in 1..=4 {
            // Push the active file past the 64-byte threshold.
            logger
                .log(format_args!("round {} {}", round, "x".repeat(80)))
                .unwrap();
            logger.check_and_rotate().unwrap();
        }

        // Rounds 1..3 fill slots 1..3; round 4 wraps and evicts slot 1.
        assert!(read(&dir.path().join("app.log.1")).contains("round 4"));
        assert!(read(&dir.path().join("app.log.2")).contains("round 2"));
        assert!(read(&dir.path().join("app.log.3")).contains("round 3"));
        assert!(!dir.path().join("app.log.4").exists());

        // The active file is fresh after the last split.
        assert_eq!(line_count(&logger.path()), 0);
    }

    #[test]
    fn test_backup_index_resumes_from_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=3 {
            fs::write(dir.path().join(format!("app.log.{}", i)), "old\n").unwrap();
        }

        let logger = FileLogger::builder(dir.path(), "app.log")
            .split_by_size(32, 5)
            .build()
            .expect("create logger");

        logger
            .log(format_args!("resumed {}", "x".repeat(64)))
            .unwrap();
        logger.check_and_rotate().unwrap();

        // Index resumed at 3, so the next split lands in slot 4.
        assert!(read(&dir.path().join("app.log.4")).contains("resumed"));
        assert_eq!(read(&dir.path().join("app.log.1")), "old\n");
    }

    #[test]
    fn test_oversized_file_split_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.log"), vec![b'x'; 256]).unwrap();

        let logger = FileLogger::builder(dir.path(), "app.log")
            .split_by_size(128, 3)
            .build()
            .expect("create logger");

        assert_eq!(fs::metadata(dir.path().join("app.log.1")).unwrap().len(), 256);
        assert_eq!(fs::metadata(logger.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_single_backup_disables_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::builder(dir.path(), "app.log")
            .split_by_size(16, 1)
            .build()
            .expect("create logger");

        logger.log(format_args!("{}", "x".repeat(512))).unwrap();
        logger.check_and_rotate().unwrap();

        assert!(!dir.path().join("app.log.1").exists());
        assert!(fs::metadata(logger.path()).unwrap().len() >= 512);
    }

    #[test]
    fn test_daily_rotation_on_day_change() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::daily(dir.path(), "app.log", "").expect("create logger");

        logger.log(format_args!("from yesterday")).unwrap();

        let yesterday = today_local().previous_day().unwrap();
        logger.core.set_period_start(yesterday);
        logger.check_and_rotate().unwrap();

        let backup = logger.core.backup_path_dated(yesterday).unwrap();
        assert!(read(&backup).contains("from yesterday"));
        assert_eq!(fs::metadata(logger.path()).unwrap().len(), 0);

        logger.log(format_args!("from today")).unwrap();
        assert!(read(&logger.path()).contains("from today"));
    }

    #[test]
    fn test_daily_rotation_idempotent_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::daily(dir.path(), "app.log", "").expect("create logger");

        let yesterday = today_local().previous_day().unwrap();
        logger.core.set_period_start(yesterday);
        logger.check_and_rotate().unwrap();

        logger.log(format_args!("after first split")).unwrap();

        // Force the stale period again: the existing dated backup blocks a
        // second split for the same day.
        logger.core.set_period_start(yesterday);
        logger.check_and_rotate().unwrap();

        assert!(read(&logger.path()).contains("after first split"));
        let backup = logger.core.backup_path_dated(yesterday).unwrap();
        assert!(!read(&backup).contains("after first split"));
    }

    #[test]
    fn test_same_day_check_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::daily(dir.path(), "app.log", "").expect("create logger");

        logger.log(format_args!("one")).unwrap();
        logger.check_and_rotate().unwrap();
        logger.log(format_args!("two")).unwrap();

        assert_eq!(line_count(&logger.path()), 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_empty_file_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileLogger::daily(dir.path(), "", "");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let logger = FileLogger::daily(&nested, "app.log", "").expect("create logger");

        logger.log(format_args!("hello")).unwrap();
        assert!(nested.join("app.log").exists());
    }

    #[test]
    fn test_shutdown_flushes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::with_defaults(dir.path(), "app.log").expect("create logger");
        let path = logger.path();

        logger.log(format_args!("last words")).unwrap();
        logger.shutdown().unwrap();

        assert!(read(&path).contains("last words"));
    }

    #[test]
    fn test_failed_rotation_keeps_writes_flowing() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the backup slot makes the split's
        // remove/rename step fail.
        fs::create_dir(dir.path().join("app.log.1")).unwrap();

        let logger = FileLogger::builder(dir.path(), "app.log")
            .split_by_size(64, 3)
            .build()
            .expect("create logger");

        logger
            .log(format_args!("before {}", "x".repeat(80)))
            .unwrap();
        // The failure is logged and swallowed; the check itself succeeds.
        logger.check_and_rotate().unwrap();

        logger.log(format_args!("after failed split")).unwrap();
        let content = read(&logger.path());
        assert!(content.contains("before"));
        assert!(content.contains("after failed split"));
        assert!(dir.path().join("app.log.1").is_dir());
    }

    #[test]
    fn test_write_survives_poisoned_lock() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::daily(dir.path(), "app.log", "").expect("create logger");

        let core = Arc::clone(&logger.core);
        let _ = std::thread::spawn(move || {
            let _guard = core.state.write().unwrap();
            panic!("poison the state lock");
        })
        .join();

        logger.log(format_args!("still alive")).unwrap();
        logger.flush().unwrap();
        assert!(read(&logger.path()).contains("still alive"));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let _logger = FileLogger::daily(&nested, "app.log", "").expect("create logger");

        let mode = fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
