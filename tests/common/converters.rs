//! In-process converter doubles

use async_trait::async_trait;
use mol2_pdbqt::{ConversionError, Converter, ExitResult};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Copies the staging file to the target, optionally failing on chosen stems
#[derive(Default)]
pub struct StubConverter {
    /// Staging file stems that exit with status 1
    pub fail_on: Vec<String>,
    /// Write a partial output before failing
    pub write_on_failure: bool,
    /// Time each conversion takes
    pub delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl StubConverter {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_on(stems: &[&str]) -> Self {
        Self {
            fail_on: stems.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_after_writing(stems: &[&str]) -> Self {
        Self {
            write_on_failure: true,
            ..Self::failing_on(stems)
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Most conversions observed running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Stems converted so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for StubConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        _options: &[String],
    ) -> Result<ExitResult, ConversionError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(stem.clone());

        if self.fail_on.contains(&stem) {
            if self.write_on_failure {
                tokio::fs::write(output, "REMARK partial\n").await.unwrap();
            }
            return Ok(ExitResult {
                status: Some(1),
                stdout: Vec::new(),
                stderr: format!("cannot parse {stem}").into_bytes(),
            });
        }

        tokio::fs::copy(input, output).await.unwrap();
        Ok(ExitResult::ok())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
