use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Result of sanitizing an archive entry path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: PathBuf,
    /// Normalized path relative to the extraction root.
    pub relative: PathBuf,
    pub resolved: PathBuf,
}

/// Sanitize an entry path against the extraction root `base`.
///
/// Backslashes are treated as separators, `.` components are dropped and
/// `..` may only climb back out of directories the entry itself named.
/// Absolute entries and anything escaping `base` are rejected as zip-slip.
pub fn sanitize_path<P: AsRef<Path>, B: AsRef<Path>>(entry_path: P, base: B) -> Result<SanitizedPath> {
    let entry_path = entry_path.as_ref();
    let base = base.as_ref();

    if entry_path.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(Error::InvalidPath);
    }

    let text = entry_path.to_string_lossy().replace('\\', "/");
    let relative = normalize_path(Path::new(&text)).ok_or_else(|| Error::ZipSlip {
        entry: entry_path.to_path_buf(),
        resolved: base.join(&text),
    })?;

    if relative.as_os_str().is_empty() {
        return Err(Error::InvalidPath);
    }

    Ok(SanitizedPath {
        original: entry_path.to_path_buf(),
        resolved: base.join(&relative),
        relative,
    })
}

/// Resolve `.` and `..` lexically; `None` when the path is rooted or climbs above its start.
fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Normal(part) => {
                result.push(part);
                depth += 1;
            }
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                result.pop();
                depth -= 1;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(result)
}
