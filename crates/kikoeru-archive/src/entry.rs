use std::path::{Path, PathBuf};

use crate::format::ArchiveFormat;

/// One item an extraction wrote to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Sanitized path relative to the extraction root.
    pub path: PathBuf,
    pub target_path: PathBuf,
    pub size: u64,
    pub kind: EntryKind,
}

impl Entry {
    pub fn new(path: PathBuf, target_path: PathBuf, size: u64, kind: EntryKind) -> Self {
        Self {
            path,
            target_path,
            size,
            kind,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// First component of the entry path, i.e. what appears at the extraction root.
    pub fn top_level(&self) -> Option<&Path> {
        self.path.components().next().map(|c| Path::new(c.as_os_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Clone, Debug)]
pub struct ArchiveReport {
    pub format: ArchiveFormat,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<Entry>,
}

impl ArchiveReport {
    pub fn new(format: ArchiveFormat, entries: Vec<Entry>) -> Self {
        Self {
            format,
            entry_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            entries,
        }
    }
}
