//! Conversion of a single record
//!
//! A task writes its record to a staging file, runs the converter on it,
//! verifies that a target file appeared, and removes the staging file if
//! asked to. Every failure is returned as a [`TaskOutcome::Failure`]; nothing
//! here panics or aborts sibling tasks.

use crate::config::{Config, RetryConfig};
use crate::converter::Converter;
use crate::error::{ConversionError, TaskError};
use crate::output::Job;
use crate::retry::with_retry;
use crate::types::TaskOutcome;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Per-task settings shared by every task of a run
#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Flags passed to the converter unchanged
    pub options: Vec<String>,
    /// Delete the staging file after a successful conversion
    pub remove_staging_on_success: bool,
    /// Report records whose target already exists as done without converting
    pub skip_existing: bool,
    /// Retry policy for transient converter failures
    pub retry: RetryConfig,
}

impl TaskSettings {
    /// Settings taken from a run configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            options: config.converter.options.clone(),
            remove_staging_on_success: config.remove_staging_on_success,
            skip_existing: config.skip_existing,
            retry: config.retry.clone(),
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The unit of work for one record
pub struct ConversionTask {
    job: Job,
    converter: Arc<dyn Converter>,
    settings: Arc<TaskSettings>,
}

impl ConversionTask {
    /// Bundle a planned job with the converter and settings it runs with
    pub fn new(job: Job, converter: Arc<dyn Converter>, settings: Arc<TaskSettings>) -> Self {
        Self {
            job,
            converter,
            settings,
        }
    }

    /// Identifier of the record this task converts
    pub fn identifier(&self) -> &str {
        self.job.identifier()
    }

    /// Staging path of the record this task converts
    pub fn staging(&self) -> &Path {
        &self.job.staging
    }

    /// Run the task to completion
    pub async fn execute(self) -> TaskOutcome {
        let job = &self.job;
        let identifier = job.identifier().to_string();

        if self.settings.skip_existing && is_non_empty_file(&job.target).await {
            debug!(%identifier, target = ?job.target, "target exists, skipping");
            return TaskOutcome::Success {
                identifier,
                target: job.target.clone(),
                staging: None,
                resumed: true,
            };
        }

        if let Err(source) = write_staging(&job.staging, job.record.text()).await {
            warn!(
                %identifier,
                staging = ?job.staging,
                error = %source,
                "failed to write staging file"
            );
            return TaskOutcome::Failure {
                identifier,
                staging: job.staging.clone(),
                error: TaskError::Io {
                    path: job.staging.clone(),
                    source,
                },
            };
        }
        debug!(%identifier, staging = ?job.staging, "staging file written");

        remove_stale(&job.target).await;
        let partial = partial_path(&job.target);
        let converted = with_retry(&self.settings.retry, || {
            run_converter(self.converter.as_ref(), job, &partial, &self.settings.options)
        })
        .await;

        if let Err(error) = converted {
            debug!(%identifier, %error, "conversion failed, keeping staging file");
            return TaskOutcome::Failure {
                identifier,
                staging: job.staging.clone(),
                error: TaskError::Conversion(error),
            };
        }

        if let Err(source) = tokio::fs::rename(&partial, &job.target).await {
            warn!(%identifier, ?partial, error = %source, "failed to move output into place");
            remove_stale(&partial).await;
            return TaskOutcome::Failure {
                identifier,
                staging: job.staging.clone(),
                error: TaskError::Io {
                    path: job.target.clone(),
                    source,
                },
            };
        }

        let staging = if self.settings.remove_staging_on_success {
            if let Err(e) = tokio::fs::remove_file(&job.staging).await {
                warn!(
                    %identifier,
                    staging = ?job.staging,
                    error = %e,
                    "failed to remove staging file"
                );
            }
            None
        } else {
            Some(job.staging.clone())
        };

        debug!(%identifier, target = ?job.target, "record converted");
        TaskOutcome::Success {
            identifier,
            target: job.target.clone(),
            staging,
            resumed: false,
        }
    }
}

async fn write_staging(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Where the converter writes before the output is known to be good
///
/// Only a checked output is renamed onto the target, so a target file on disk
/// always means a finished conversion.
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

async fn remove_stale(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(?path, "removed stale output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?path, error = %e, "could not remove stale output"),
    }
}

/// One converter invocation with its result checks
///
/// Whatever the converter left at `partial` is removed on every failure.
async fn run_converter(
    converter: &dyn Converter,
    job: &Job,
    partial: &Path,
    options: &[String],
) -> Result<(), ConversionError> {
    remove_stale(partial).await;

    let checked = check_output(converter, job, partial, options).await;
    if checked.is_err() {
        remove_stale(partial).await;
    }
    checked
}

async fn check_output(
    converter: &dyn Converter,
    job: &Job,
    partial: &Path,
    options: &[String],
) -> Result<(), ConversionError> {
    let exit = converter.convert(&job.staging, partial, options).await?;

    if !exit.success() {
        return Err(ConversionError::Exit {
            status: exit.status,
            stdout: exit.stdout,
            stderr: exit.stderr,
        });
    }

    if !is_non_empty_file(partial).await {
        return Err(ConversionError::MissingOutput {
            path: partial.to_path_buf(),
            stderr: exit.stderr,
        });
    }

    Ok(())
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
