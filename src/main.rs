#![deny(unsafe_code)]

use clap::{Parser, ValueEnum};
use mol2_pdbqt::{
    ArchiveReport, Config, ConversionError, DuplicatePolicy, Pipeline, TaskError, TaskOutcome,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Split MOL2 archives into single molecules and convert each to PDBQT.
///
/// For every ARCHIVE (e.g. `ZINC_AA.mol2.gz`) a directory named after it
/// (`ZINC_AA/`) receives one `.pdbqt` file per molecule.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Gzipped or plain MOL2 archives to convert
    #[arg(required = true, value_name = "ARCHIVE")]
    archives: Vec<PathBuf>,

    /// TOML configuration file; command line flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of records converted at the same time
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Keep the per-record .mol2 staging files after a successful conversion
    #[arg(long)]
    keep_staging: bool,

    /// Do not reconvert records whose .pdbqt already exists
    #[arg(long)]
    skip_existing: bool,

    /// Converter binary (default: obabel or babel from PATH)
    #[arg(long, value_name = "PATH")]
    converter: Option<PathBuf>,

    /// Converter flag, repeat for several; replaces the default
    /// `--partialcharge gasteiger --AddPolarH`
    #[arg(long = "converter-option", value_name = "FLAG", allow_hyphen_values = true)]
    converter_options: Vec<String>,

    /// Per-record timeout in seconds, 0 disables it
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// How to handle records that share an identifier
    #[arg(long, value_enum, value_name = "POLICY")]
    on_duplicate: Option<DuplicateArg>,

    /// Write a JSON report of every archive to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log per-record detail
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DuplicateArg {
    Rename,
    Fail,
    Overwrite,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::Rename => DuplicatePolicy::Rename,
            DuplicateArg::Fail => DuplicatePolicy::Fail,
            DuplicateArg::Overwrite => DuplicatePolicy::Overwrite,
        }
    }
}

/// Effective configuration, archives to process, report destination
type Invocation = (Config, Vec<PathBuf>, Option<PathBuf>);

impl Args {
    fn into_config(self) -> mol2_pdbqt::Result<Invocation> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };

        if let Some(jobs) = self.jobs {
            config.concurrency = jobs;
        }
        if self.keep_staging {
            config.remove_staging_on_success = false;
        }
        if self.skip_existing {
            config.skip_existing = true;
        }
        if let Some(binary) = self.converter {
            config.converter.binary = Some(binary);
        }
        if !self.converter_options.is_empty() {
            config.converter.options = self.converter_options;
        }
        if let Some(secs) = self.timeout {
            config.converter.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(policy) = self.on_duplicate {
            config.duplicate_policy = policy.into();
        }

        config.validate()?;
        Ok((config, self.archives, self.report))
    }
}

fn progress_line(index: usize, total: usize, archive: &Path) -> String {
    format!("{}/{} - dealing with {}", index + 1, total, archive.display())
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "mol2_pdbqt=debug"
    } else {
        "mol2_pdbqt=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &ArchiveReport) {
    println!(
        "{}: {} converted, {} failed, {} rejected -> {}",
        report.archive.display(),
        report.succeeded(),
        report.failed(),
        report.rejected.len(),
        report.output_dir.display()
    );
    for outcome in report.failures() {
        if let TaskOutcome::Failure {
            identifier,
            staging,
            error,
        } = outcome
        {
            println!("  FAILED {identifier} ({}): {error}", staging.display());
            if let TaskError::Conversion(ConversionError::Exit { stdout, .. }) = error {
                let stdout = String::from_utf8_lossy(stdout);
                if !stdout.trim().is_empty() {
                    println!("    stdout: {}", stdout.trim());
                }
            }
        }
    }
    for rejected in &report.rejected {
        println!("  REJECTED chunk #{}: {}", rejected.index, rejected.reason);
    }
    for renamed in &report.renamed {
        println!("  RENAMED {} -> {}", renamed.identifier, renamed.stem);
    }
    for superseded in &report.superseded {
        println!(
            "  SUPERSEDED {} (record #{} replaced by #{})",
            superseded.identifier, superseded.index, superseded.by
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let (config, archives, report_path) = match args.into_config() {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let pipeline = match Pipeline::from_config(config) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "cannot start");
            return ExitCode::from(2);
        }
    };

    let cancel = pipeline.cancellation_token();
    tokio::spawn(mol2_pdbqt::cancel_on_signal(cancel.clone()));

    let total = archives.len();
    let mut summaries = Vec::with_capacity(total);
    let mut all_clean = true;

    for (i, archive) in archives.iter().enumerate() {
        if cancel.is_cancelled() {
            println!("cancelled, skipping remaining {} archive(s)", total - i);
            all_clean = false;
            break;
        }

        println!("\n{}", progress_line(i, total, archive));
        match pipeline.process_archive(archive).await {
            Ok(report) => {
                print_report(&report);
                all_clean &= report.is_clean();
                summaries.push(report.summary());
            }
            Err(e) => {
                println!("{}: aborted: {e}", archive.display());
                all_clean = false;
            }
        }
    }

    if let Some(path) = report_path {
        let written = serde_json::to_vec_pretty(&summaries)
            .map_err(mol2_pdbqt::Error::from)
            .and_then(|json| std::fs::write(&path, json).map_err(mol2_pdbqt::Error::from));
        if let Err(e) = written {
            error!(error = %e, path = ?path, "failed to write report");
            all_clean = false;
        }
    }

    cancel.cancel();
    if all_clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
