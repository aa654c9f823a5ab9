//! CLI-based converter using the external Open Babel binary

use super::traits::{Converter, ExitResult};
use crate::config::{ConverterConfig, RecordConfig};
use crate::error::{ConversionError, Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Binary names searched on PATH, newest first
const BINARY_NAMES: [&str; 2] = ["obabel", "babel"];

/// Converter that executes Open Babel
///
/// Invocations look like
/// `obabel -imol2 <input> -opdbqt <output> <options...>`.
/// The child is killed if the returned future is dropped, which is what lets
/// [`TimeoutConverter`](super::TimeoutConverter) and cancellation stop it.
#[derive(Debug, Clone)]
pub struct CliConverter {
    binary_path: PathBuf,
    input_format: String,
    output_format: String,
}

impl CliConverter {
    /// Create a converter with an explicit binary path
    ///
    /// # Arguments
    ///
    /// * `binary_path` - Path to the converter binary
    /// * `input_format` - Format code passed as `-i<format>`
    /// * `output_format` - Format code passed as `-o<format>`
    pub fn new(
        binary_path: PathBuf,
        input_format: impl Into<String>,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            binary_path,
            input_format: input_format.into(),
            output_format: output_format.into(),
        }
    }

    /// Attempt to find `obabel` (or `babel`) in PATH
    pub fn from_path(input_format: &str, output_format: &str) -> Option<Self> {
        BINARY_NAMES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| Self::new(path, input_format, output_format))
    }

    /// Build a converter from configuration
    ///
    /// An explicit `binary` wins; otherwise PATH is searched when allowed.
    pub fn from_config(converter: &ConverterConfig, records: &RecordConfig) -> Result<Self> {
        let source = records.source_extension.as_str();
        let target = records.target_extension.as_str();

        if let Some(binary) = &converter.binary {
            return Ok(Self::new(binary.clone(), source, target));
        }
        if !converter.search_path {
            return Err(Error::ExternalTool(
                "no converter binary configured and PATH search is disabled".to_string(),
            ));
        }
        Self::from_path(source, target).ok_or_else(|| {
            Error::ExternalTool(format!(
                "none of {BINARY_NAMES:?} found in PATH; install Open Babel or set converter.binary"
            ))
        })
    }

    /// Path of the binary this converter runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, input: &Path, output: &Path, options: &[String]) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .arg(format!("-i{}", self.input_format))
            .arg(input)
            .arg(format!("-o{}", self.output_format))
            .arg(output)
            .args(options)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Converter for CliConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &[String],
    ) -> std::result::Result<ExitResult, ConversionError> {
        let out = self
            .command(input, output, options)
            .output()
            .await
            .map_err(|source| ConversionError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?;

        Ok(ExitResult {
            status: out.status.code(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    fn name(&self) -> &'static str {
        "cli-openbabel"
    }
}
