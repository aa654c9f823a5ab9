//! Error types for mol2-pdbqt
//!
//! Errors fall into two groups:
//! - [`Error`]: archive-level and run-level failures (configuration, decompression,
//!   output directory, duplicate identifiers). These abort the affected archive.
//! - [`TaskError`] / [`ConversionError`]: per-record failures. These are captured
//!   inside a [`TaskOutcome`](crate::types::TaskOutcome) and never abort sibling records.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for mol2-pdbqt operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mol2-pdbqt
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Archive could not be opened or decompressed
    #[error("failed to decompress {path}: {source}")]
    Decompression {
        /// The archive being read
        path: PathBuf,
        /// Underlying I/O or codec error
        #[source]
        source: std::io::Error,
    },

    /// Archive name carries no recognized suffix, so no output directory can be derived
    #[error("cannot derive an output directory from {path}: {reason}")]
    InvalidArchiveName {
        /// The offending archive path
        path: PathBuf,
        /// Why the name was rejected
        reason: String,
    },

    /// Destination directory could not be created
    #[error("failed to create output directory {path}: {source}")]
    DirectoryCreation {
        /// The directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Two records in one archive share an identifier and the policy forbids it
    #[error("duplicate identifier '{identifier}' in archive (records {first} and {second})")]
    DuplicateIdentifier {
        /// The repeated identifier
        identifier: String,
        /// Index of the first record carrying it
        first: usize,
        /// Index of the later record carrying it
        second: usize,
    },

    /// External tool could not be located or started
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Report serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a chunk of an archive could not become a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordFormatError {
    /// Nothing but blank lines followed the marker
    #[error("no identifier line after the record marker")]
    MissingIdentifier,

    /// The identifier line cannot be used as a file name
    #[error("identifier '{identifier}' cannot be used as a file name: {reason}")]
    UnusableIdentifier {
        /// The identifier as found in the record
        identifier: String,
        /// What makes it unusable
        reason: &'static str,
    },
}

/// Failure of a single converter invocation
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Converter exited with a non-zero status
    #[error(
        "converter exited with {}: {}",
        display_status(.status),
        String::from_utf8_lossy(.stderr).trim()
    )]
    Exit {
        /// Exit code, `None` when the process was terminated by a signal
        status: Option<i32>,
        /// Captured standard output
        stdout: Vec<u8>,
        /// Captured standard error
        stderr: Vec<u8>,
    },

    /// Converter reported success but left no usable output file
    #[error("converter exited successfully but produced no output at {path}")]
    MissingOutput {
        /// The expected target path
        path: PathBuf,
        /// Captured standard error, often explains why nothing was written
        stderr: Vec<u8>,
    },

    /// Converter did not finish in time and was killed
    #[error("converter timed out after {}s", .after.as_secs_f64())]
    TimedOut {
        /// The timeout that elapsed
        after: Duration,
    },

    /// Converter process could not be spawned
    #[error("failed to spawn converter {binary}: {source}")]
    Spawn {
        /// Binary that was being executed
        binary: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    /// Exit status reported by the converter, if it ran to completion
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            ConversionError::Exit { status, .. } => *status,
            ConversionError::MissingOutput { .. } => Some(0),
            _ => None,
        }
    }

    /// Captured standard error of the converter, empty when none was collected
    pub fn stderr(&self) -> &[u8] {
        match self {
            ConversionError::Exit { stderr, .. }
            | ConversionError::MissingOutput { stderr, .. } => stderr,
            _ => &[],
        }
    }
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

/// Failure of one conversion task
#[derive(Debug, Error)]
pub enum TaskError {
    /// Staging file could not be written, or the output not moved into place
    #[error("failed to write {path}: {source}")]
    Io {
        /// The file being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// External converter failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Task was cancelled before it could finish
    #[error("task cancelled")]
    Cancelled,

    /// Task panicked inside the worker
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Trait for errors that can be classified as retryable or not
///
/// Only transient failures should return `true`. A converter that exits non-zero
/// on a record will do so again, so those are permanent.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ConversionError {
    fn is_retryable(&self) -> bool {
        matches!(self, ConversionError::TimedOut { .. })
    }
}

impl IsRetryable for TaskError {
    fn is_retryable(&self) -> bool {
        match self {
            TaskError::Conversion(e) => e.is_retryable(),
            TaskError::Io { .. } | TaskError::Cancelled | TaskError::Panicked(_) => false,
        }
    }
}
