//! Deadline wrapper for converters

use super::traits::{Converter, ExitResult};
use crate::error::ConversionError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Converter that gives up on invocations running longer than `timeout`
///
/// The inner future is dropped when the deadline passes; for
/// [`CliConverter`](super::CliConverter) that kills the child process, so a
/// hung record frees its pool slot instead of holding it forever.
pub struct TimeoutConverter {
    inner: Arc<dyn Converter>,
    timeout: Duration,
}

impl TimeoutConverter {
    /// Wrap `inner` with a per-invocation deadline
    pub fn new(inner: Arc<dyn Converter>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Converter for TimeoutConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &[String],
    ) -> Result<ExitResult, ConversionError> {
        match tokio::time::timeout(self.timeout, self.inner.convert(input, output, options)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    converter = self.inner.name(),
                    ?input,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "conversion timed out, child killed"
                );
                Err(ConversionError::TimedOut {
                    after: self.timeout,
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
