//! Traits and types for external conversion

use crate::error::ConversionError;
use async_trait::async_trait;
use std::path::Path;

/// What a finished converter process reported
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitResult {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    /// Everything written to standard output
    pub stdout: Vec<u8>,
    /// Everything written to standard error
    pub stderr: Vec<u8>,
}

impl ExitResult {
    /// A zero exit with no output, mostly useful for fakes
    pub fn ok() -> Self {
        Self {
            status: Some(0),
            ..Default::default()
        }
    }

    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Trait for converting one file into another format
///
/// Implementations must not interpret the exit status: a non-zero exit is
/// still `Ok(ExitResult)`. `Err` is reserved for invocations that did not run
/// to completion (spawn failure, timeout).
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input` into `output`, passing `options` through unchanged
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The converter process cannot be started
    /// - The invocation exceeds a deadline (for timeout wrappers)
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &[String],
    ) -> Result<ExitResult, ConversionError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
