//! Archive pipeline: decompress, split, plan, convert, report
//!
//! Stages for one archive:
//! 1. Derive the output directory from the archive name
//! 2. Read and decompress the archive
//! 3. Split it into records
//! 4. Plan staging/target paths (duplicate identifiers resolved here)
//! 5. Create the output directory
//! 6. Convert every record on the worker pool
//!
//! A failure in stages 1-5 aborts the archive and is returned as `Err`.
//! Failures in stage 6 are per record and end up in the [`ArchiveReport`].

use crate::archive::read_archive;
use crate::config::Config;
use crate::converter::{CliConverter, Converter, TimeoutConverter};
use crate::error::Result;
use crate::output::OutputLocation;
use crate::pool::WorkerPool;
use crate::splitter::RecordSplitter;
use crate::task::{ConversionTask, TaskSettings};
use crate::types::{ArchiveReport, Event};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Capacity of the event channel; slow subscribers see `Lagged` past this
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Converts whole archives
pub struct Pipeline {
    config: Arc<Config>,
    converter: Arc<dyn Converter>,
    pool: WorkerPool,
    settings: Arc<TaskSettings>,
    splitter: RecordSplitter,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline around an explicit converter
    ///
    /// The converter is wrapped in a [`TimeoutConverter`] when the
    /// configuration sets a timeout.
    pub fn new(config: Config, converter: Arc<dyn Converter>) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.pool_size()?);

        let converter: Arc<dyn Converter> = match config.converter.timeout {
            Some(timeout) => Arc::new(TimeoutConverter::new(converter, timeout)),
            None => converter,
        };

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            settings: Arc::new(TaskSettings::from_config(&config)),
            splitter: RecordSplitter::new(config.records.marker.clone()),
            config: Arc::new(config),
            converter,
            pool,
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a pipeline that runs Open Babel, located per configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let cli = CliConverter::from_config(&config.converter, &config.records)?;
        info!(binary = ?cli.binary_path(), "using converter");
        Self::new(config, Arc::new(cli))
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels in-flight and pending conversions when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process one archive into the directory derived from its name
    pub async fn process_archive(&self, archive: &Path) -> Result<ArchiveReport> {
        self.emit(Event::ArchiveStarted {
            archive: archive.to_path_buf(),
        });

        let result = match OutputLocation::for_archive(archive, &self.config.records) {
            Ok(location) => self.run_archive(archive, location).await,
            Err(e) => Err(e),
        };

        self.finish(archive, result)
    }

    /// Process one archive into an explicit output location
    pub async fn process_archive_into(
        &self,
        archive: &Path,
        location: OutputLocation,
    ) -> Result<ArchiveReport> {
        self.emit(Event::ArchiveStarted {
            archive: archive.to_path_buf(),
        });
        let result = self.run_archive(archive, location).await;
        self.finish(archive, result)
    }

    async fn run_archive(&self, archive: &Path, location: OutputLocation) -> Result<ArchiveReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(?archive, output_dir = ?location.directory(), "processing archive");

        let content = read_archive(archive).await?;
        let split = self.splitter.split(&content);
        drop(content);

        if !split.rejected.is_empty() {
            warn!(
                ?archive,
                rejected = split.rejected.len(),
                "some chunks could not be turned into records"
            );
        }
        self.emit(Event::ArchiveSplit {
            archive: archive.to_path_buf(),
            records: split.records.len(),
            rejected: split.rejected.len(),
        });

        let plan = location.plan(split.records, self.config.duplicate_policy)?;
        location.ensure_directory().await?;

        let tasks: Vec<ConversionTask> = plan
            .jobs
            .into_iter()
            .map(|job| ConversionTask::new(job, self.converter.clone(), self.settings.clone()))
            .collect();

        info!(
            ?archive,
            records = tasks.len(),
            concurrency = self.pool.concurrency(),
            "converting records"
        );

        let outcomes = self
            .pool
            .run_with(tasks, &self.cancel, |outcome| {
                self.emit(Event::from_outcome(outcome));
            })
            .await;

        Ok(ArchiveReport {
            archive: archive.to_path_buf(),
            output_dir: location.directory().to_path_buf(),
            outcomes,
            rejected: split.rejected,
            renamed: plan.renamed,
            superseded: plan.superseded,
            started_at,
            elapsed: clock.elapsed(),
        })
    }

    fn finish(&self, archive: &Path, result: Result<ArchiveReport>) -> Result<ArchiveReport> {
        match &result {
            Ok(report) => {
                info!(
                    ?archive,
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    rejected = report.rejected.len(),
                    elapsed_secs = report.elapsed.as_secs_f64(),
                    "archive finished"
                );
                self.emit(Event::ArchiveFinished {
                    archive: archive.to_path_buf(),
                    succeeded: report.succeeded(),
                    failed: report.failed(),
                });
            }
            Err(e) => {
                warn!(?archive, error = %e, "archive aborted");
                self.emit(Event::ArchiveFailed {
                    archive: archive.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
