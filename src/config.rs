//! Configuration types for mol2-pdbqt

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest delay accepted between two retries
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Record marker that opens every Tripos MOL2 molecule
pub const TRIPOS_MOLECULE_MARKER: &str = "@<TRIPOS>MOLECULE";

/// Main configuration for a conversion run
///
/// Every field has a default, so an empty TOML file (or `Config::default()`)
/// reproduces the classic behavior: 50 workers, Gasteiger charges, polar
/// hydrogens, staging files removed after a successful conversion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of records converted at the same time (default: 50)
    ///
    /// Each in-flight record owns a child process and a few file descriptors,
    /// so this is the knob that keeps large archives within OS limits.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delete the staging `.mol2` file once its record converted (default: true)
    #[serde(default = "default_true")]
    pub remove_staging_on_success: bool,

    /// Do not reconvert records whose target file already exists (default: false)
    #[serde(default)]
    pub skip_existing: bool,

    /// What to do when two records in one archive share an identifier
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Record format settings
    #[serde(default)]
    pub records: RecordConfig,

    /// External converter settings
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Retry behavior for timed-out conversions
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            remove_staging_on_success: true,
            skip_existing: false,
            duplicate_policy: DuplicatePolicy::default(),
            records: RecordConfig::default(),
            converter: ConverterConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config {
                message: "concurrency must be at least 1".to_string(),
                key: Some("concurrency".to_string()),
            });
        }
        if self.records.marker.trim().is_empty() {
            return Err(Error::Config {
                message: "record marker must not be empty".to_string(),
                key: Some("records.marker".to_string()),
            });
        }
        for (key, ext) in [
            ("records.source_extension", &self.records.source_extension),
            ("records.target_extension", &self.records.target_extension),
        ] {
            if ext.is_empty() || ext.contains(['.', '/', '\\']) {
                return Err(Error::Config {
                    message: format!("'{ext}' is not a bare file extension"),
                    key: Some(key.to_string()),
                });
            }
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff multiplier must be a finite number of at least 1".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        if self.retry.max_delay > MAX_RETRY_DELAY {
            return Err(Error::Config {
                message: format!("max_delay must not exceed {}s", MAX_RETRY_DELAY.as_secs()),
                key: Some("retry.max_delay".to_string()),
            });
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::Config {
                message: "initial_delay must not exceed max_delay".to_string(),
                key: Some("retry.initial_delay".to_string()),
            });
        }
        if self.records.source_extension == self.records.target_extension {
            return Err(Error::Config {
                message: "source and target extensions must differ".to_string(),
                key: Some("records.target_extension".to_string()),
            });
        }
        Ok(())
    }

    /// Pool size as the non-zero value the worker pool requires
    pub fn pool_size(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.concurrency).ok_or_else(|| Error::Config {
            message: "concurrency must be at least 1".to_string(),
            key: Some("concurrency".to_string()),
        })
    }
}

/// Record framing and file naming
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Literal line that starts every record (default: "@<TRIPOS>MOLECULE")
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Extension of staging files, also the converter's input format (default: "mol2")
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension of converted files, also the converter's output format (default: "pdbqt")
    #[serde(default = "default_target_extension")]
    pub target_extension: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            source_extension: default_source_extension(),
            target_extension: default_target_extension(),
        }
    }
}

/// External converter binary and invocation options
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to the converter executable (auto-detected if None)
    #[serde(default)]
    pub binary: Option<PathBuf>,

    /// Whether to search PATH for `obabel`/`babel` if `binary` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Flags appended to every invocation, passed through unchanged
    #[serde(default = "default_converter_options")]
    pub options: Vec<String>,

    /// Kill a conversion that runs longer than this (default: 300 seconds, 0 = never)
    #[serde(default = "default_timeout", with = "optional_duration_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary: None,
            search_path: true,
            options: default_converter_options(),
            timeout: default_timeout(),
        }
    }
}

/// Duplicate identifier handling within one archive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Append `_2`, `_3`, ... to later occurrences (default)
    #[default]
    Rename,
    /// Abort the archive before anything is converted
    Fail,
    /// Let later records overwrite earlier ones
    Overwrite,
}

/// Retry configuration for transient conversion failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_concurrency() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_marker() -> String {
    TRIPOS_MOLECULE_MARKER.to_string()
}

fn default_source_extension() -> String {
    "mol2".to_string()
}

fn default_target_extension() -> String {
    "pdbqt".to_string()
}

fn default_converter_options() -> Vec<String> {
    vec![
        "--partialcharge".into(),
        "gasteiger".into(),
        "--AddPolarH".into(),
    ]
}

fn default_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Timeout helper: whole seconds, 0 meaning "no timeout"
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.map_or(0, |d| d.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }
}
