//! Reading MOL2 archives into memory
//!
//! Archives are either gzip files (`.mol2.gz`, possibly with several gzip
//! members concatenated) or plain `.mol2` files. The format is detected from
//! the gzip magic bytes, not the file name, so a mislabelled file still reads.

use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::debug;

/// Leading bytes of every gzip member
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Read and decompress an archive without blocking the async runtime
pub async fn read_archive(path: &Path) -> Result<Vec<u8>> {
    let owned: PathBuf = path.to_path_buf();
    spawn_blocking(move || read_archive_blocking(&owned))
        .await
        .map_err(|e| Error::Decompression {
            path: path.to_path_buf(),
            source: std::io::Error::other(format!("decompression task panicked: {e}")),
        })?
}

/// Read and decompress an archive on the current thread
pub fn read_archive_blocking(path: &Path) -> Result<Vec<u8>> {
    let wrap = |source: std::io::Error| Error::Decompression {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(wrap)?;
    let mut reader = BufReader::new(file);
    let gzipped = reader.fill_buf().map_err(wrap)?.starts_with(&GZIP_MAGIC);

    let mut content = Vec::new();
    if gzipped {
        MultiGzDecoder::new(reader)
            .read_to_end(&mut content)
            .map_err(wrap)?;
    } else {
        reader.read_to_end(&mut content).map_err(wrap)?;
    }

    debug!(?path, gzipped, bytes = content.len(), "read archive");
    Ok(content)
}
