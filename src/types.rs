//! Core types: task outcomes, archive reports and progress events

use crate::error::TaskError;
use crate::output::{Renamed, Superseded};
use crate::splitter::RejectedChunk;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Result of converting one record
#[derive(Debug)]
pub enum TaskOutcome {
    /// The target file exists
    Success {
        /// Record identifier
        identifier: String,
        /// Converted file
        target: PathBuf,
        /// Staging file, if it was kept
        staging: Option<PathBuf>,
        /// True when the target already existed and nothing was converted
        resumed: bool,
    },
    /// The record could not be converted
    Failure {
        /// Record identifier
        identifier: String,
        /// Staging file, left behind for diagnosis when it was written
        staging: PathBuf,
        /// What went wrong
        error: TaskError,
    },
}

impl TaskOutcome {
    /// Identifier of the record this outcome belongs to
    pub fn identifier(&self) -> &str {
        match self {
            TaskOutcome::Success { identifier, .. } | TaskOutcome::Failure { identifier, .. } => {
                identifier
            }
        }
    }

    /// Whether the record converted (or was already converted)
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

/// Everything that happened to one archive
#[derive(Debug)]
pub struct ArchiveReport {
    /// The archive that was processed
    pub archive: PathBuf,
    /// Directory the outputs were written to
    pub output_dir: PathBuf,
    /// One outcome per record, in completion order
    pub outcomes: Vec<TaskOutcome>,
    /// Chunks that could not be turned into records
    pub rejected: Vec<RejectedChunk>,
    /// Duplicate identifiers that were written under a different name
    pub renamed: Vec<Renamed>,
    /// Duplicates dropped because a later record overwrites them
    pub superseded: Vec<Superseded>,
    /// When processing of the archive started
    pub started_at: DateTime<Utc>,
    /// Wall-clock time spent on the archive
    pub elapsed: Duration,
}

impl ArchiveReport {
    /// Number of records whose target file exists
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of records that failed
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failed outcomes only
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Whether every record converted and no chunk was rejected
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.rejected.is_empty()
    }

    /// Serializable view of the report
    pub fn summary(&self) -> ReportSummary {
        let failures = self
            .failures()
            .filter_map(|outcome| match outcome {
                TaskOutcome::Failure {
                    identifier,
                    staging,
                    error,
                } => Some(FailureSummary {
                    identifier: identifier.clone(),
                    staging: staging.clone(),
                    error: error.to_string(),
                    exit_status: match error {
                        TaskError::Conversion(e) => e.exit_status(),
                        _ => None,
                    },
                    stderr: match error {
                        TaskError::Conversion(e) => {
                            String::from_utf8_lossy(e.stderr()).into_owned()
                        }
                        _ => String::new(),
                    },
                }),
                TaskOutcome::Success { .. } => None,
            })
            .collect();

        ReportSummary {
            archive: self.archive.clone(),
            output_dir: self.output_dir.clone(),
            started_at: self.started_at,
            elapsed_secs: self.elapsed.as_secs_f64(),
            records: self.outcomes.len(),
            succeeded: self.succeeded(),
            resumed: self
                .outcomes
                .iter()
                .filter(|o| matches!(o, TaskOutcome::Success { resumed: true, .. }))
                .count(),
            failed: self.failed(),
            failures,
            rejected: self
                .rejected
                .iter()
                .map(|r| RejectedSummary {
                    index: r.index,
                    reason: r.reason.to_string(),
                })
                .collect(),
            renamed: self.renamed.clone(),
            superseded: self.superseded.clone(),
        }
    }
}

/// JSON form of an [`ArchiveReport`]
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    /// The archive that was processed
    pub archive: PathBuf,
    /// Directory the outputs were written to
    pub output_dir: PathBuf,
    /// When processing started
    pub started_at: DateTime<Utc>,
    /// Seconds spent on the archive
    pub elapsed_secs: f64,
    /// Records submitted for conversion
    pub records: usize,
    /// Records whose target file exists
    pub succeeded: usize,
    /// Successes that were already converted by an earlier run
    pub resumed: usize,
    /// Records that failed
    pub failed: usize,
    /// Details of each failure
    pub failures: Vec<FailureSummary>,
    /// Chunks that were not records
    pub rejected: Vec<RejectedSummary>,
    /// Duplicates written under another name
    pub renamed: Vec<Renamed>,
    /// Duplicates dropped in favor of a later record
    pub superseded: Vec<Superseded>,
}

/// One failed record in a [`ReportSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    /// Record identifier
    pub identifier: String,
    /// Staging file kept for diagnosis
    pub staging: PathBuf,
    /// Error message
    pub error: String,
    /// Converter exit status, when it exited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Converter standard error
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

/// One rejected chunk in a [`ReportSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct RejectedSummary {
    /// Position among marker occurrences
    pub index: usize,
    /// Why it was rejected
    pub reason: String,
}

/// Event emitted while archives are processed
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An archive is about to be read
    ArchiveStarted {
        /// Archive path
        archive: PathBuf,
    },

    /// An archive was split into records
    ArchiveSplit {
        /// Archive path
        archive: PathBuf,
        /// Records found
        records: usize,
        /// Chunks rejected
        rejected: usize,
    },

    /// A record converted successfully
    RecordConverted {
        /// Record identifier
        identifier: String,
        /// Converted file
        target: PathBuf,
        /// Already converted by an earlier run
        resumed: bool,
    },

    /// A record failed to convert
    RecordFailed {
        /// Record identifier
        identifier: String,
        /// Error message
        error: String,
    },

    /// All records of an archive have an outcome
    ArchiveFinished {
        /// Archive path
        archive: PathBuf,
        /// Records converted
        succeeded: usize,
        /// Records failed
        failed: usize,
    },

    /// The archive could not be processed at all
    ArchiveFailed {
        /// Archive path
        archive: PathBuf,
        /// Error message
        error: String,
    },
}

impl Event {
    /// Event describing a finished task
    pub fn from_outcome(outcome: &TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Success {
                identifier,
                target,
                resumed,
                ..
            } => Event::RecordConverted {
                identifier: identifier.clone(),
                target: target.clone(),
                resumed: *resumed,
            },
            TaskOutcome::Failure {
                identifier, error, ..
            } => Event::RecordFailed {
                identifier: identifier.clone(),
                error: error.to_string(),
            },
        }
    }
}
