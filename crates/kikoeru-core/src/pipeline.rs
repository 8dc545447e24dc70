//! Recursive extraction of one stable upload.
//!
//! A run has two phases. **Plan** extracts the upload, and every archive it
//! recurses into, inside a hidden [`Staging`] directory next to the upload,
//! classifying each level as soon as its extraction finishes. Nothing in the
//! working directory changes while planning, so a failure at any depth
//! leaves the upload exactly as it was. **Apply** then moves each level's
//! content to its final place, removes nested archive files as their level
//! completes, and finally removes the upload itself.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use kikoeru_archive::{ArchiveExtractor, format};
use kikoeru_fs::{Staging, move_entry, remove_entry, unique_destination};
use tracing::{debug, error, info, warn};

use crate::classify::{Classifier, Disposition, Entry, ExtractionResult};
use crate::password::{self, PasswordChain};
use crate::quarantine::{self, QuarantineRecord};
use crate::report::{Outcome, Reporter, Status};
use crate::{Error, Result};

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Drives extraction, classification and disposition for uploads.
pub struct RecursiveExtractor<E> {
    extractor: E,
    classifier: Classifier,
    max_depth: usize,
}

/// What a successful run did.
#[derive(Debug)]
struct Processed {
    disposition: Disposition,
    nested_depth: usize,
    quarantined: Vec<QuarantineRecord>,
}

/// Why a run stopped, and where its partial work was kept.
#[derive(Debug)]
struct Failure {
    error: Error,
    staging: Option<PathBuf>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            staging: None,
        }
    }
}

/// One extracted archive, classified, with the levels below it.
#[derive(Debug)]
struct Level {
    result: ExtractionResult,
    /// On-disk location of each entry, parallel to `result.entries`.
    paths: Vec<PathBuf>,
    disposition: Disposition,
    children: Vec<Level>,
}

impl Level {
    fn deepest(&self) -> usize {
        self.children
            .iter()
            .map(Level::deepest)
            .max()
            .unwrap_or(self.result.source_depth)
    }
}

impl<E: ArchiveExtractor> RecursiveExtractor<E> {
    pub fn new(extractor: E, classifier: Classifier) -> Self {
        Self {
            extractor,
            classifier,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Process `archive` and hand the outcome to `reporter`.
    pub fn run_reported(&self, archive: &Path, reporter: &dyn Reporter) -> Outcome {
        let outcome = self.run(archive);
        if let Err(e) = reporter.record(&outcome) {
            error!(archive = %archive.display(), error = %e, "failed to record outcome");
        }
        outcome
    }

    /// Process `archive`, folding any failure into the returned outcome.
    pub fn run(&self, archive: &Path) -> Outcome {
        let timestamp = Local::now();
        let started = Instant::now();
        let result = self.process_at(archive, timestamp);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(processed) => {
                info!(
                    archive = %archive.display(),
                    disposition = %processed.disposition,
                    nested_depth = processed.nested_depth,
                    elapsed_ms,
                    "processed upload"
                );
                Outcome {
                    timestamp,
                    archive: archive.to_path_buf(),
                    status: Status::Completed {
                        disposition: processed.disposition,
                    },
                    nested_depth: processed.nested_depth,
                    quarantined: processed.quarantined,
                }
            }
            Err(failure) => {
                error!(
                    archive = %archive.display(),
                    error = %failure.error,
                    staging = ?failure.staging,
                    elapsed_ms,
                    "processing failed, upload left in place"
                );
                Outcome {
                    timestamp,
                    archive: archive.to_path_buf(),
                    status: Status::Failed {
                        depth: failure.error.depth(),
                        reason: failure.error.to_string(),
                        staging: failure.staging,
                    },
                    nested_depth: failure.error.depth().unwrap_or(0),
                    quarantined: Vec::new(),
                }
            }
        }
    }

    fn process_at(
        &self,
        archive: &Path,
        at: DateTime<Local>,
    ) -> std::result::Result<Processed, Failure> {
        if !self.extractor.looks_like_archive(archive) {
            return Err(Error::NotAnArchive(archive.to_path_buf()).into());
        }
        let work_dir = archive
            .parent()
            .ok_or_else(|| Error::NotAnArchive(archive.to_path_buf()))?;

        let name = file_name(archive);
        let resolved = password::resolve(&name);
        if let Some(anomaly) = &resolved.anomaly {
            warn!(archive = %archive.display(), %anomaly, "ignoring malformed password hint");
        }
        debug!(
            archive = %archive.display(),
            base_name = %resolved.base_name,
            levels = resolved.chain.len(),
            "resolved password chain"
        );

        let staging = Staging::new_in(work_dir).map_err(Error::from)?;

        let tree = match self.plan(&staging, archive, &resolved.base_name, &resolved.chain, 0) {
            Ok(tree) => tree,
            Err(error) => {
                return Err(Failure {
                    error,
                    staging: Some(staging.persist()),
                });
            }
        };

        let mut quarantined = Vec::new();
        if let Err(error) = self.apply(&tree, work_dir, at, &mut quarantined) {
            return Err(Failure {
                error,
                staging: Some(staging.persist()),
            });
        }

        remove_entry(archive).map_err(Error::from)?;
        debug!(archive = %archive.display(), "removed processed upload");

        Ok(Processed {
            disposition: tree.disposition,
            nested_depth: tree.deepest(),
            quarantined,
        })
    }

    fn plan(
        &self,
        staging: &Staging,
        archive: &Path,
        base_name: &str,
        chain: &PasswordChain,
        depth: usize,
    ) -> Result<Level> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep {
                archive: archive.to_path_buf(),
                depth,
            });
        }

        let destination = staging.create_dir(&format!("level-{depth}"))?;
        let password = chain.level(depth);
        let report = self
            .extractor
            .extract(archive, &destination, password)
            .map_err(|source| Error::Extraction {
                archive: archive.to_path_buf(),
                depth,
                source,
            })?;
        debug!(
            archive = %archive.display(),
            depth,
            format = %report.format,
            entries = report.entry_count,
            bytes = report.total_bytes,
            "extracted"
        );

        let (entries, paths) = self.snapshot(&destination)?;
        let result = ExtractionResult {
            source_path: archive.to_path_buf(),
            source_base_name: base_name.to_string(),
            source_depth: depth,
            entries,
        };
        let disposition = self.classifier.classify(&result);
        info!(
            archive = %archive.display(),
            depth,
            entries = result.entries.len(),
            %disposition,
            "classified"
        );

        let mut children = Vec::new();
        if disposition == Disposition::RecurseEachEntry {
            for path in &paths {
                let name = file_name(path);
                let base = nested_base_name(&name);
                children.push(self.plan(staging, path, &base, chain, depth + 1)?);
            }
        }

        Ok(Level {
            result,
            paths,
            disposition,
            children,
        })
    }

    /// Top-level entries of a finished extraction, sorted by name.
    fn snapshot(&self, dir: &Path) -> Result<(Vec<Entry>, Vec<PathBuf>)> {
        let io_error = |source| Error::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for item in std::fs::read_dir(dir).map_err(io_error)? {
            paths.push(item.map_err(io_error)?.path());
        }
        paths.sort();

        let entries = paths
            .iter()
            .map(|path| {
                let name = file_name(path);
                if path.is_dir() {
                    Entry::directory(name)
                } else if self.extractor.looks_like_archive(path) {
                    Entry::archive(name)
                } else {
                    Entry::file(name)
                }
            })
            .collect();
        Ok((entries, paths))
    }

    fn apply(
        &self,
        level: &Level,
        work_dir: &Path,
        at: DateTime<Local>,
        quarantined: &mut Vec<QuarantineRecord>,
    ) -> Result<()> {
        let result = &level.result;
        match level.disposition {
            Disposition::KeepInPlace => {
                for path in &level.paths {
                    let target = unique_destination(work_dir, &file_name(path));
                    move_entry(path, &target)?;
                    debug!(target = %target.display(), "kept in place");
                }
            }
            Disposition::RenameToSourceName => {
                for path in &level.paths {
                    let target = unique_destination(work_dir, &result.source_base_name);
                    move_entry(path, &target)?;
                    debug!(from = %file_name(path), target = %target.display(), "renamed to source name");
                }
            }
            Disposition::Quarantine(rule) => {
                let dir_name = quarantine::directory_name(at.date_naive(), &result.source_base_name);
                let destination = unique_destination(work_dir, &dir_name);
                std::fs::create_dir_all(&destination).map_err(|source| Error::Io {
                    path: destination.clone(),
                    source,
                })?;

                let record = QuarantineRecord {
                    destination,
                    archive: file_name(&result.source_path),
                    depth: result.source_depth,
                    rule,
                    entries: result
                        .entries
                        .iter()
                        .map(|e| {
                            if e.is_directory {
                                format!("{}/", e.name)
                            } else {
                                e.name.clone()
                            }
                        })
                        .collect(),
                };
                quarantine::write_log(&record, at)?;
                for path in &level.paths {
                    move_entry(path, unique_destination(&record.destination, &file_name(path)))?;
                }
                quarantined.push(record);
            }
            Disposition::RecurseEachEntry => {
                for child in &level.children {
                    self.apply(child, work_dir, at, quarantined)?;
                    remove_entry(&child.result.source_path)?;
                }
            }
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Nested archives carry no password hint; only the extension goes.
fn nested_base_name(name: &str) -> String {
    match format::split_extension(name) {
        Some((stem, _, _)) => stem.to_string(),
        None => name.to_string(),
    }
}
