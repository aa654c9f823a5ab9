//! Marker-based splitting of concatenated MOL2 text into single records
//!
//! No MOL2 parsing happens here. The decompressed archive is cut at every
//! occurrence of the record marker, blank lines are dropped, and the line that
//! follows the marker is taken as the record identifier. The marker is trusted
//! never to appear inside a record body.

use crate::error::RecordFormatError;
use std::borrow::Cow;
use tracing::{debug, warn};

/// One self-contained record, starting with its marker line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    identifier: String,
    text: String,
}

impl Record {
    /// Identifier token from the line after the marker, used as the base file name
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Full record text: marker line, identifier line, body; newline separated
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A chunk that followed a marker but could not be turned into a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedChunk {
    /// Zero-based position of the chunk among all marker occurrences
    pub index: usize,
    /// Why it was rejected
    pub reason: RecordFormatError,
}

/// Result of splitting one archive
#[derive(Debug, Clone, Default)]
pub struct Split {
    /// Well-formed records in archive order
    pub records: Vec<Record>,
    /// Chunks that were dropped, in archive order
    pub rejected: Vec<RejectedChunk>,
}

impl Split {
    /// Number of marker occurrences seen, accepted or not
    pub fn marker_count(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

/// Splits decompressed archive content at a fixed marker line
#[derive(Debug, Clone)]
pub struct RecordSplitter {
    marker: String,
}

impl RecordSplitter {
    /// Create a splitter for the given marker literal
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Split raw decompressed bytes
    ///
    /// Invalid UTF-8 is replaced rather than rejected; MOL2 is plain ASCII, so
    /// a replacement character only ever lands in free-text fields.
    pub fn split(&self, raw: &[u8]) -> Split {
        let text = String::from_utf8_lossy(raw);
        if let Cow::Owned(_) = text {
            warn!("archive content is not valid UTF-8, invalid bytes were replaced");
        }
        self.split_str(&text)
    }

    /// Split already decoded text
    ///
    /// Everything before the first marker is discarded. Each following chunk
    /// becomes one record, or one [`RejectedChunk`] when it has no usable
    /// identifier, so `records + rejected` always equals the marker count.
    pub fn split_str(&self, text: &str) -> Split {
        let mut split = Split::default();

        for (index, chunk) in text.split(self.marker.as_str()).skip(1).enumerate() {
            match self.build_record(chunk) {
                Ok(record) => split.records.push(record),
                Err(reason) => {
                    debug!(index, %reason, "rejecting chunk");
                    split.rejected.push(RejectedChunk { index, reason });
                }
            }
        }

        debug!(
            records = split.records.len(),
            rejected = split.rejected.len(),
            "split archive"
        );
        split
    }

    fn build_record(&self, chunk: &str) -> Result<Record, RecordFormatError> {
        let mut lines = chunk.lines().map(str::trim).filter(|line| !line.is_empty());

        let identifier = lines.next().ok_or(RecordFormatError::MissingIdentifier)?;
        check_identifier(identifier)?;

        let mut text = String::with_capacity(chunk.len() + self.marker.len());
        text.push_str(&self.marker);
        text.push('\n');
        text.push_str(identifier);
        for line in lines {
            text.push('\n');
            text.push_str(line);
        }

        Ok(Record {
            identifier: identifier.to_string(),
            text,
        })
    }
}

fn check_identifier(identifier: &str) -> Result<(), RecordFormatError> {
    let reason = if identifier == "." || identifier == ".." {
        "reserved path component"
    } else if identifier.contains(['/', '\\']) {
        "contains a path separator"
    } else if identifier.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };

    Err(RecordFormatError::UnusableIdentifier {
        identifier: identifier.to_string(),
        reason,
    })
}
