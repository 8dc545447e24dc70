use crate::{Error, Result};
use std::io::Write;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default)]
pub struct AtomicWriteOptions {
    /// fsync the content before it becomes visible under `path`.
    pub sync: bool,
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Write `content` to a sibling temp file, then rename it over `path`.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| Error::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other("no parent directory"),
    })?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".kikoeru-write-")
        .tempfile_in(parent)
        .map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;

    tmp.write_all(content).map_err(|e| Error::Write {
        path: tmp.path().to_path_buf(),
        source: e,
    })?;

    if options.sync {
        tmp.as_file().sync_all().map_err(|e| Error::Write {
            path: tmp.path().to_path_buf(),
            source: e,
        })?;
    }

    tmp.persist(path).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}
