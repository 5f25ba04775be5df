use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, de};
use time::Date;

use crate::{Error, Result};

/// Binary size units for the size-split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SizeUnit {
    /// 1024 bytes.
    Kb = 1 << 10,
    /// 1024² bytes.
    Mb = 1 << 20,
    /// 1024³ bytes.
    Gb = 1 << 30,
    /// 1024⁴ bytes.
    Tb = 1 << 40,
}

impl SizeUnit {
    /// Number of bytes in one unit.
    pub fn bytes(self) -> u64 {
        self as u64
    }
}

/// Parse a size string with optional units (K/M/G/T, case-insensitive), defaulting to KB if no unit.
fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    // Split on the last char's byte offset so a multi-byte trailing letter
    // reaches the invalid-unit error instead of panicking mid-slice.
    let (num_str, unit) = match s.char_indices().last() {
        Some((idx, c)) if c.is_alphabetic() => (&s[..idx], c.to_ascii_uppercase()),
        _ => (s, 'K'), // Default to KB
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier = match unit {
        'K' => SizeUnit::Kb.bytes(),
        'M' => SizeUnit::Mb.bytes(),
        'G' => SizeUnit::Gb.bytes(),
        'T' => SizeUnit::Tb.bytes(),
        _ => return Err(format!("invalid unit: {}, supported: K/M/G/T", unit)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number or string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

impl SizeValue {
    fn to_bytes(&self) -> std::result::Result<u64, String> {
        match self {
            SizeValue::Number(n) => parse_size(&n.to_string()),
            SizeValue::String(s) => parse_size(s),
        }
    }
}

/// When and how the active log file is split.
///
/// The policy is a pure decision function: [`RotationPolicy::must_rotate`]
/// inspects the current file state and answers "is a split due right now?".
/// The mechanics of splitting live in [`crate::FileLogger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Split once the active file reaches `max_size` bytes, keeping a ring
    /// of `max_backups` numbered backup files.
    ///
    /// A `max_backups` of 1 disables splitting entirely. That quirk is part
    /// of the contract: single-backup configurations run unrotated.
    Size {
        /// Threshold in bytes at which the active file is split.
        max_size: u64,
        /// Number of numbered backup slots to cycle through.
        max_backups: usize,
    },
    /// Split when the local calendar day changes, keeping one dated backup
    /// per past day.
    Daily,
}

impl<'de> Deserialize<'de> for RotationPolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PolicyInput {
            Simple(String),
            Complex {
                #[serde(rename = "type")]
                policy_type: Option<String>,
                max_size: Option<SizeValue>,
                max_backups: Option<usize>,
            },
        }

        let input = PolicyInput::deserialize(deserializer)?;

        match input {
            PolicyInput::Simple(policy_type) => match policy_type.as_str() {
                "daily" => Ok(RotationPolicy::Daily),
                "size" => Ok(RotationPolicy::Size {
                    max_size: DEFAULT_MAX_SIZE,
                    max_backups: DEFAULT_MAX_BACKUPS,
                }),
                other => Err(de::Error::custom(format!(
                    "unknown rotation type: {}",
                    other
                ))),
            },
            PolicyInput::Complex {
                policy_type,
                max_size,
                max_backups,
            } => match policy_type.as_deref() {
                Some("daily") => Ok(RotationPolicy::Daily),
                Some("size") | None => {
                    let max_size = max_size
                        .ok_or_else(|| {
                            de::Error::custom("max_size is required for size-based rotation")
                        })?
                        .to_bytes()
                        .map_err(de::Error::custom)?;
                    let max_backups = max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);
                    Ok(RotationPolicy::Size {
                        max_size,
                        max_backups,
                    })
                }
                Some(other) => Err(de::Error::custom(format!(
                    "unknown rotation type: {}",
                    other
                ))),
            },
        }
    }
}

/// Default backup slot count for size-based splitting.
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// Default split threshold for size-based splitting (50 MB).
pub const DEFAULT_MAX_SIZE: u64 = 50 * (1 << 20);

impl RotationPolicy {
    /// Create a size-based policy.
    pub fn size(max_size: u64, max_backups: usize) -> Self {
        Self::Size {
            max_size,
            max_backups,
        }
    }

    /// Create a size-based policy from a count of units.
    pub fn size_in(threshold: u64, unit: SizeUnit, max_backups: usize) -> Self {
        Self::Size {
            max_size: threshold.saturating_mul(unit.bytes()),
            max_backups,
        }
    }

    /// Create a daily policy.
    pub fn daily() -> Self {
        Self::Daily
    }

    /// Get the number of backup slots, if size-based.
    pub fn max_backups(&self) -> Option<usize> {
        match self {
            Self::Size { max_backups, .. } => Some(*max_backups),
            Self::Daily => None,
        }
    }

    /// Decide whether the active file must be split right now.
    ///
    /// Side-effect free. A missing or unreadable active file counts as
    /// zero bytes and never produces an error.
    pub fn must_rotate(&self, active: &Path, period_start: Date, today: Date) -> bool {
        match self {
            Self::Size {
                max_size,
                max_backups,
            } => *max_backups > 1 && file_size(active) >= *max_size,
            Self::Daily => today > period_start,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Self::Size {
            max_size,
            max_backups,
        } = self
        {
            if *max_backups < 1 {
                return Err(Error::Config(
                    "max_backups must be at least 1".to_string(),
                ));
            }
            if *max_size == 0 {
                return Err(Error::Config("max_size must be non-zero".to_string()));
            }
        }
        Ok(())
    }
}

/// On-disk size of `path`, treating a missing or unreadable file as empty.
pub(crate) fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
