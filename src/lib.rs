//! # mol2-pdbqt
//!
//! Split multi-record MOL2 archives (as distributed by ZINC) into single
//! molecules and convert each one to PDBQT with Open Babel, in parallel.
//!
//! ## Overview
//!
//! - [`splitter`] cuts decompressed text at every `@<TRIPOS>MOLECULE` marker
//! - [`output`] derives the output directory and per-record file names
//! - [`task`] converts one record: staging file, converter call, cleanup
//! - [`pool`] runs tasks with a fixed concurrency bound and isolates failures
//! - [`pipeline`] ties it together per archive and reports the outcome
//!
//! ## Quick Start
//!
//! ```no_run
//! use mol2_pdbqt::{Config, Pipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         concurrency: 16,
//!         ..Default::default()
//!     };
//!     let pipeline = Pipeline::from_config(config)?;
//!
//!     let report = pipeline.process_archive(Path::new("ZINC_AAAA.mol2.gz")).await?;
//!     println!("{} converted, {} failed", report.succeeded(), report.failed());
//!     for failure in report.failures() {
//!         println!("failed: {}", failure.identifier());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Reading gzip or plain archives
pub mod archive;
/// Run configuration
pub mod config;
/// Running the external converter
pub mod converter;
/// Error types
pub mod error;
/// Output directory and file naming
pub mod output;
/// Per-archive pipeline
pub mod pipeline;
/// Bounded worker pool
pub mod pool;
/// Backoff for transient converter failures
pub mod retry;
/// Cutting archives into records
pub mod splitter;
/// Single-record conversion
pub mod task;
/// Outcomes, reports and events
pub mod types;

// Re-exports for the common path
pub use config::{Config, ConverterConfig, DuplicatePolicy, RecordConfig, RetryConfig};
pub use converter::{CliConverter, Converter, ExitResult, TimeoutConverter};
pub use error::{ConversionError, Error, RecordFormatError, Result, TaskError};
pub use output::{Job, OutputLocation, Plan, Renamed, Superseded};
pub use pipeline::Pipeline;
pub use pool::WorkerPool;
pub use splitter::{Record, RecordSplitter, RejectedChunk, Split};
pub use task::{ConversionTask, TaskSettings};
pub use types::{ArchiveReport, Event, ReportSummary, TaskOutcome};

use tokio_util::sync::CancellationToken;

/// Cancel `token` on SIGINT or SIGTERM (Ctrl+C elsewhere)
///
/// Returns without cancelling if the token is cancelled by someone else first.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        signal = termination() => {
            tracing::warn!(signal, "cancelling pending conversions");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn termination() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(mut int), Ok(mut term)) => tokio::select! {
            _ = int.recv() => "SIGINT",
            _ = term.recv() => "SIGTERM",
        },
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "signal handlers unavailable, falling back to ctrl_c");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn termination() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C, running without cancellation");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
