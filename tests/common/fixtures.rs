//! Archive fixtures and generators

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Two records behind leading noise, as ZINC archives look after decompression
pub const TWO_RECORD_ARCHIVE: &str =
    "noise@<TRIPOS>MOLECULE\nZINC001\nfoo\n\n@<TRIPOS>MOLECULE\nZINC002\nbar\n";

/// Archive where two records share an identifier
pub const DUPLICATE_ARCHIVE: &str = "@<TRIPOS>MOLECULE\nZINC001\nfirst\n\
     @<TRIPOS>MOLECULE\nZINC001\nsecond\n\
     @<TRIPOS>MOLECULE\nZINC003\nthird\n";

/// Build an archive of `n` records named `ZINC000000`, `ZINC000001`, ...
pub fn generated_archive(n: usize) -> String {
    (0..n)
        .map(|i| format!("@<TRIPOS>MOLECULE\nZINC{i:06}\n@<TRIPOS>ATOM\n 1 C1 0.0 0.0 0.0 C.3\n"))
        .collect()
}

/// Write `text` gzip-compressed to `dir/name`
pub fn write_gz(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

/// Sorted file names in `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
