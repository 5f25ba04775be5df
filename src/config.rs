use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FileLogger, Result, RotationPolicy};

fn default_scan_interval_secs() -> u64 {
    60
}

/// Configuration for a file logger, usually loaded from YAML or TOML.
///
/// ```yaml
/// directory: /var/log/app
/// file_name: app.log
/// prefix: "[app] "
/// rotation:
///   type: size
///   max_size: "50M"
///   max_backups: 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Directory holding the active file and its backups.
    pub directory: PathBuf,
    /// Name of the active log file.
    pub file_name: String,
    /// Line prefix written before the timestamp.
    #[serde(default)]
    pub prefix: String,
    /// When and how the active file is split.
    pub rotation: RotationPolicy,
    /// Seconds between background rotation checks.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

impl LoggerConfig {
    /// Create a config with the default size policy.
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            prefix: String::new(),
            rotation: RotationPolicy::size(
                crate::rotation::DEFAULT_MAX_SIZE,
                crate::rotation::DEFAULT_MAX_BACKUPS,
            ),
            scan_interval_secs: default_scan_interval_secs(),
        }
    }

    /// Set the line prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the rotation policy.
    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the background check interval in seconds.
    pub fn with_scan_interval_secs(mut self, secs: u64) -> Self {
        self.scan_interval_secs = secs;
        self
    }

    /// Open a logger from this configuration.
    pub fn open(self) -> Result<FileLogger> {
        FileLogger::open(
            self.directory,
            self.file_name,
            self.prefix,
            self.rotation,
            Duration::from_secs(self.scan_interval_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::{DEFAULT_MAX_BACKUPS, DEFAULT_MAX_SIZE};

    #[test]
    fn test_config_new_defaults() {
        let config = LoggerConfig::new("/var/log/app", "app.log");
        assert_eq!(config.directory, PathBuf::from("/var/log/app"));
        assert_eq!(config.file_name, "app.log");
        assert_eq!(config.prefix, "");
        assert_eq!(
            config.rotation,
            RotationPolicy::size(DEFAULT_MAX_SIZE, DEFAULT_MAX_BACKUPS)
        );
        assert_eq!(config.scan_interval_secs, 60);
    }

    #[test]
    fn test_config_builders() {
        let config = LoggerConfig::new("logs", "app.log")
            .with_prefix("[cfg] ")
            .with_rotation(RotationPolicy::daily())
            .with_scan_interval_secs(10);

        assert_eq!(config.prefix, "[cfg] ");
        assert_eq!(config.rotation, RotationPolicy::daily());
        assert_eq!(config.scan_interval_secs, 10);
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
directory: /var/log/app
file_name: app.log
prefix: "[app] "
rotation:
  type: size
  max_size: "50M"
  max_backups: 10
scan_interval_secs: 30
"#;
        let config: LoggerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.directory, PathBuf::from("/var/log/app"));
        assert_eq!(config.prefix, "[app] ");
        assert_eq!(
            config.rotation,
            RotationPolicy::size(50 * 1024 * 1024, 10)
        );
        assert_eq!(config.scan_interval_secs, 30);
    }

    #[test]
    fn test_config_from_yaml_minimal() {
        let yaml = r#"
directory: logs
file_name: app.log
rotation: daily
"#;
        let config: LoggerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.prefix, "");
        assert_eq!(config.rotation, RotationPolicy::daily());
        assert_eq!(config.scan_interval_secs, 60);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
directory = "logs"
file_name = "app.log"
scan_interval_secs = 15

[rotation]
type = "size"
max_size = "1G"
max_backups = 4
"#;
        let config: LoggerConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.rotation,
            RotationPolicy::size(1024 * 1024 * 1024, 4)
        );
        assert_eq!(config.scan_interval_secs, 15);
    }

    #[test]
    fn test_config_opens_logger() {
        let dir = tempfile::tempdir().unwrap();
        let logger = LoggerConfig::new(dir.path(), "app.log")
            .with_rotation(RotationPolicy::daily())
            .open()
            .expect("open logger");

        logger.log(format_args!("configured")).unwrap();
        assert!(
            std::fs::read_to_string(logger.path())
                .unwrap()
                .contains("configured")
        );
    }
}
