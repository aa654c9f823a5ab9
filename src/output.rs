//! Output layout: where an archive's converted files go
//!
//! For an archive `X.mol2.gz` the outputs land in directory `X/`, one
//! `id.pdbqt` per record plus the staging `id.mol2` while (or if) it is kept.

use crate::config::{DuplicatePolicy, RecordConfig};
use crate::error::{Error, Result};
use crate::splitter::Record;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Path derivations for one archive's outputs
#[derive(Debug, Clone)]
pub struct OutputLocation {
    directory: PathBuf,
    source_extension: String,
    target_extension: String,
}

impl OutputLocation {
    /// Derive the output location for an archive
    ///
    /// The directory is the archive path with its recognized suffix removed,
    /// tried in order: `.<source>.gz`, `.gz`, `.<source>`. Anything else is
    /// rejected because the directory would have the archive's own name.
    pub fn for_archive(archive: &Path, records: &RecordConfig) -> Result<Self> {
        Ok(Self {
            directory: directory_for(archive, &records.source_extension)?,
            source_extension: records.source_extension.clone(),
            target_extension: records.target_extension.clone(),
        })
    }

    /// Use an explicit directory instead of deriving one
    pub fn in_directory(directory: impl Into<PathBuf>, records: &RecordConfig) -> Self {
        Self {
            directory: directory.into(),
            source_extension: records.source_extension.clone(),
            target_extension: records.target_extension.clone(),
        }
    }

    /// The archive's output directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the output directory; succeeds if it already exists
    pub async fn ensure_directory(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| Error::DirectoryCreation {
                path: self.directory.clone(),
                source,
            })?;
        debug!(directory = ?self.directory, "output directory ready");
        Ok(())
    }

    /// Staging file for a record with the given file stem
    pub fn staging_path_for(&self, stem: &str) -> PathBuf {
        self.directory
            .join(format!("{stem}.{}", self.source_extension))
    }

    /// Converted file that corresponds to a staging file
    pub fn target_path_for(&self, staging: &Path) -> PathBuf {
        staging.with_extension(&self.target_extension)
    }

    /// Assign every record a unique staging/target pair
    ///
    /// Collisions between identifiers are resolved according to `policy`.
    /// With [`DuplicatePolicy::Rename`] later occurrences get `_2`, `_3`, ...,
    /// skipping any stem that is already taken by another record. With
    /// [`DuplicatePolicy::Overwrite`] only the last occurrence is planned and
    /// the earlier ones are listed in [`Plan::superseded`], so no two jobs
    /// ever share a path.
    pub fn plan(&self, records: Vec<Record>, policy: DuplicatePolicy) -> Result<Plan> {
        let mut first_seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut taken: HashSet<String> = records
            .iter()
            .map(|r| r.identifier().to_string())
            .collect();
        let last_seen: HashMap<String, usize> = match policy {
            DuplicatePolicy::Overwrite => records
                .iter()
                .enumerate()
                .map(|(index, r)| (r.identifier().to_string(), index))
                .collect(),
            DuplicatePolicy::Rename | DuplicatePolicy::Fail => HashMap::new(),
        };
        let mut next_suffix: HashMap<String, usize> = HashMap::new();
        let mut jobs = Vec::with_capacity(records.len());
        let mut renamed = Vec::new();
        let mut superseded = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let identifier = record.identifier().to_string();

            if let Some(&last) = last_seen.get(&identifier) {
                if last != index {
                    warn!(
                        %identifier,
                        index,
                        by = last,
                        "duplicate identifier superseded by a later record"
                    );
                    superseded.push(Superseded {
                        identifier,
                        index,
                        by: last,
                    });
                    continue;
                }
            }

            let stem = match first_seen.get(&identifier) {
                None => {
                    first_seen.insert(identifier.clone(), index);
                    identifier.clone()
                }
                Some(&first) => match policy {
                    DuplicatePolicy::Fail => {
                        return Err(Error::DuplicateIdentifier {
                            identifier,
                            first,
                            second: index,
                        });
                    }
                    // Earlier occurrences were skipped above
                    DuplicatePolicy::Overwrite => identifier.clone(),
                    DuplicatePolicy::Rename => {
                        let counter = next_suffix.entry(identifier.clone()).or_insert(2);
                        let stem = loop {
                            let candidate = format!("{identifier}_{counter}");
                            *counter += 1;
                            if taken.insert(candidate.clone()) {
                                break candidate;
                            }
                        };
                        warn!(%identifier, %stem, "duplicate identifier renamed");
                        renamed.push(Renamed {
                            identifier: identifier.clone(),
                            stem: stem.clone(),
                        });
                        stem
                    }
                },
            };

            let staging = self.staging_path_for(&stem);
            let target = self.target_path_for(&staging);
            jobs.push(Job {
                record,
                staging,
                target,
            });
        }

        Ok(Plan {
            jobs,
            renamed,
            superseded,
        })
    }
}

/// One record together with its output paths
#[derive(Debug, Clone)]
pub struct Job {
    /// The record to convert
    pub record: Record,
    /// Where the record is written before conversion
    pub staging: PathBuf,
    /// Where the converter writes its output
    pub target: PathBuf,
}

impl Job {
    /// Identifier of the record
    pub fn identifier(&self) -> &str {
        self.record.identifier()
    }
}

/// A duplicate identifier that was given a new file stem
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Renamed {
    /// Identifier as it appears in the record
    pub identifier: String,
    /// File stem it was written under
    pub stem: String,
}

/// A duplicate that was not converted because a later record takes its paths
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Superseded {
    /// The shared identifier
    pub identifier: String,
    /// Position of the dropped record in the archive
    pub index: usize,
    /// Position of the record converted in its place
    pub by: usize,
}

/// Planned jobs for one archive
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// One job per planned record, in archive order
    pub jobs: Vec<Job>,
    /// Duplicates that were renamed
    pub renamed: Vec<Renamed>,
    /// Duplicates dropped in favor of a later record
    pub superseded: Vec<Superseded>,
}

/// Output directory for an archive: its path minus the recognized suffix
pub fn directory_for(archive: &Path, source_extension: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::InvalidArchiveName {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    };

    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("file name is missing or not valid UTF-8"))?;

    let suffixes = [
        format!(".{source_extension}.gz"),
        ".gz".to_string(),
        format!(".{source_extension}"),
    ];
    let stem = suffixes
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix.as_str()))
        .ok_or_else(|| invalid("expected a .gz or .mol2 suffix"))?;

    if stem.is_empty() {
        return Err(invalid("nothing is left of the name once the suffix is removed"));
    }

    Ok(archive.with_file_name(stem))
}
