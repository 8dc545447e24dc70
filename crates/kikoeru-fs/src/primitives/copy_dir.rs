use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::{Error, Result};

/// Copy the tree under `src` into `dest`, returning the bytes copied.
///
/// Symlinks are not followed and not recreated; extracted uploads never
/// contain them.
pub fn copy_dir_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| Error::Read {
            path: e.path().unwrap_or(src).to_path_buf(),
            source: e.into(),
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::Write {
                path: target.clone(),
                source: e,
            })?;
        } else if file_type.is_file() {
            copied += fs::copy(entry.path(), &target).map_err(|e| Error::Write {
                path: target.clone(),
                source: e,
            })?;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }
    Ok(copied)
}
