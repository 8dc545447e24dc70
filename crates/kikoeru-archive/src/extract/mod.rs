//! The extraction seam and the per-format implementations behind it.
//!
//! [`NativeExtractor`] sniffs the archive's magic bytes (falling back to the
//! file extension), then writes every entry below `destination` after
//! passing its path through [`sanitize_path`](crate::sanitize_path).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::entry::{ArchiveReport, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::format::{self, ArchiveFormat};
use crate::options::ExtractOptions;
use crate::sanitize::SanitizedPath;

mod rar;
#[cfg(feature = "sevenz")]
mod sevenz;
#[cfg(feature = "tar")]
mod tar;
#[cfg(feature = "zip")]
mod zip;

/// Something that can unpack an archive file into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into the existing or creatable directory `destination`.
    ///
    /// `password` is `None` when the caller has no password for this level.
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        password: Option<&str>,
    ) -> Result<ArchiveReport>;

    /// Whether `path` is a regular file this extractor would accept.
    fn looks_like_archive(&self, path: &Path) -> bool;
}

/// Extractor backed by the `zip`, `sevenz-rust` and `tar` crates, with RAR
/// delegated to an external `unrar` program.
#[derive(Clone, Debug, Default)]
pub struct NativeExtractor {
    options: ExtractOptions,
}

impl NativeExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

impl ArchiveExtractor for NativeExtractor {
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        password: Option<&str>,
    ) -> Result<ArchiveReport> {
        let format = resolve_format(archive)?;
        debug!(
            archive = %archive.display(),
            %format,
            with_password = password.is_some(),
            "extracting"
        );
        ensure_directory(destination)?;

        let extracted = match format {
            #[cfg(feature = "zip")]
            ArchiveFormat::Zip => zip::extract(archive, destination, password)?,
            #[cfg(feature = "sevenz")]
            ArchiveFormat::SevenZip => sevenz::extract(archive, destination, password)?,
            #[cfg(feature = "tar")]
            ArchiveFormat::Tar(codec) => {
                if password.is_some() {
                    debug!(archive = %archive.display(), "tar archives carry no encryption, ignoring password");
                }
                tar::extract(archive, destination, codec)?
            }
            ArchiveFormat::Rar => rar::extract(
                archive,
                destination,
                password,
                &self.options.unrar_program,
            )?,
            #[allow(unreachable_patterns)]
            _ => return Err(Error::UnsupportedFormat),
        };

        Ok(ArchiveReport::new(format, extracted.entries))
    }

    fn looks_like_archive(&self, path: &Path) -> bool {
        is_archive_path(path)
    }
}

/// A regular file with a known archive extension, or an extensionless file
/// whose leading bytes match a known signature.
pub fn is_archive_path(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if format::from_extension(name).is_some() {
        return true;
    }
    if Path::new(name).extension().is_some() {
        return false;
    }
    matches!(format::sniff_path(path), Ok(Some(_)))
}

fn resolve_format(archive: &Path) -> Result<ArchiveFormat> {
    let mut file = File::open(archive).map_err(|e| Error::ExtractionFailed {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let sniffed = format::detect_from_reader(&mut file)?;
    sniffed
        .or_else(|| {
            archive
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(format::from_extension)
        })
        .ok_or(Error::UnsupportedFormat)
}

/// Entries written by one format implementation.
#[derive(Debug, Default)]
pub(crate) struct Extracted {
    pub entries: Vec<Entry>,
}

impl Extracted {
    fn directory(&mut self, path: SanitizedPath) -> Result<()> {
        ensure_directory(&path.resolved)?;
        self.entries.push(Entry::new(
            path.relative,
            path.resolved,
            0,
            EntryKind::Directory,
        ));
        Ok(())
    }

    fn file<R: Read + ?Sized>(&mut self, path: SanitizedPath, reader: &mut R) -> Result<()> {
        let size = write_file(reader, &path.resolved)?;
        self.entries
            .push(Entry::new(path.relative, path.resolved, size, EntryKind::File));
        Ok(())
    }
}

fn write_file<R: Read + ?Sized>(reader: &mut R, target_path: &Path) -> Result<u64> {
    if let Some(parent) = target_path.parent() {
        ensure_directory(parent)?;
    }

    let failed = |e| Error::ExtractionFailed {
        path: target_path.to_path_buf(),
        source: e,
    };
    let mut file = File::create(target_path).map_err(failed)?;
    let written = std::io::copy(reader, &mut file).map_err(failed)?;
    file.flush().map_err(failed)?;
    Ok(written)
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
