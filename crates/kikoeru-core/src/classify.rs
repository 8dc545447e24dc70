use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub const DEFAULT_MARKER_PREFIX: &str = "RJ";

/// One top-level item produced by an extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
    pub is_archive: bool,
}

impl Entry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            is_archive: false,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            is_archive: false,
        }
    }

    pub fn archive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            is_archive: true,
        }
    }

    fn is_plain_file(&self) -> bool {
        !self.is_directory && !self.is_archive
    }
}

/// Entries of one extraction plus the identity of the archive they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionResult {
    pub source_path: PathBuf,
    /// Archive name without extension and without password hint.
    pub source_base_name: String,
    /// 0 for the uploaded archive itself.
    pub source_depth: usize,
    pub entries: Vec<Entry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineRule {
    /// Archives side by side with plain files.
    MixedArchivesAndFiles,
    /// Plain files at the top level.
    LooseFiles,
    /// Several directories, not all of them marked.
    UnmarkedDirectories,
}

impl QuarantineRule {
    /// Position in the rule order, counting the non-quarantine rules.
    pub fn number(self) -> u8 {
        match self {
            Self::MixedArchivesAndFiles => 4,
            Self::LooseFiles => 5,
            Self::UnmarkedDirectories => 6,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::MixedArchivesAndFiles => "archives mixed with plain files",
            Self::LooseFiles => "plain files at the top level",
            Self::UnmarkedDirectories => "directories without the marker prefix",
        }
    }
}

impl fmt::Display for QuarantineRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {} ({})", self.number(), self.describe())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    KeepInPlace,
    RenameToSourceName,
    RecurseEachEntry,
    Quarantine(QuarantineRule),
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepInPlace => f.write_str("keep in place"),
            Self::RenameToSourceName => f.write_str("rename to source name"),
            Self::RecurseEachEntry => f.write_str("recurse into each entry"),
            Self::Quarantine(rule) => write!(f, "quarantine by {rule}"),
        }
    }
}

/// Decides what happens to the content of one extraction.
///
/// Rules, first match wins:
///
/// 1. only directories, all marked: keep in place
/// 2. one unmarked directory from a marked archive: rename it after the archive
/// 3. only archives: recurse into each
/// 4. archives and plain files together: quarantine
/// 5. any plain file or archive next to directories: quarantine
/// 6. anything else: quarantine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classifier {
    marker_prefix: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_PREFIX)
    }
}

impl Classifier {
    pub fn new(marker_prefix: impl Into<String>) -> Self {
        Self {
            marker_prefix: marker_prefix.into(),
        }
    }

    pub fn is_marked(&self, name: &str) -> bool {
        name.starts_with(&self.marker_prefix)
    }

    pub fn classify(&self, result: &ExtractionResult) -> Disposition {
        let entries = &result.entries;

        if entries
            .iter()
            .all(|e| e.is_directory && self.is_marked(&e.name))
        {
            return Disposition::KeepInPlace;
        }

        if let [only] = entries.as_slice() {
            if only.is_directory
                && !self.is_marked(&only.name)
                && self.is_marked(&result.source_base_name)
            {
                return Disposition::RenameToSourceName;
            }
        }

        if entries.iter().all(|e| e.is_archive && !e.is_directory) {
            return Disposition::RecurseEachEntry;
        }

        if entries.iter().any(|e| e.is_archive) && entries.iter().any(Entry::is_plain_file) {
            return Disposition::Quarantine(QuarantineRule::MixedArchivesAndFiles);
        }

        if entries.iter().any(|e| !e.is_directory) {
            return Disposition::Quarantine(QuarantineRule::LooseFiles);
        }

        Disposition::Quarantine(QuarantineRule::UnmarkedDirectories)
    }
}
