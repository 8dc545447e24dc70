use std::path::Path;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::{Error, Result};

/// Size signature of a file or directory at one point in time.
///
/// Two equal footprints taken one poll apart mean nothing was written in
/// between, as far as sizes and modification times can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    pub bytes: u64,
    pub entries: u64,
    pub modified: Option<SystemTime>,
}

impl Footprint {
    /// Files report their byte length; directories report the recursive
    /// byte total, the number of entries below them and the newest mtime.
    pub fn measure(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        if !metadata.is_dir() {
            return Ok(Self {
                bytes: metadata.len(),
                entries: 1,
                modified: metadata.modified().ok(),
            });
        }

        let mut footprint = Self {
            bytes: 0,
            entries: 0,
            modified: metadata.modified().ok(),
        };

        for entry in WalkDir::new(path)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            footprint.entries += 1;
            if meta.is_file() {
                footprint.bytes += meta.len();
            }
            if let Ok(modified) = meta.modified() {
                footprint.modified = footprint.modified.max(Some(modified));
            }
        }

        Ok(footprint)
    }
}
