use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Move a file or directory, refusing to overwrite an existing destination.
///
/// Falls back to copy + remove when `src` and `dest` live on different devices.
pub fn move_entry(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if fs::symlink_metadata(dest).is_ok() {
        return Err(Error::AlreadyExists(dest.to_path_buf()));
    }

    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(src.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                from = %src.display(),
                to = %dest.display(),
                "rename crosses devices, copying instead"
            );
            if src.is_dir() {
                crate::copy_dir_all(src, dest)?;
            } else {
                fs::copy(src, dest).map_err(|e| Error::Move {
                    from: src.to_path_buf(),
                    to: dest.to_path_buf(),
                    source: e,
                })?;
            }
            remove_entry(src)
        }
        Err(e) => Err(Error::Move {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        }),
    }
}

/// Remove a file or a whole directory tree.
pub fn remove_entry(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let metadata = fs::symlink_metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| Error::Remove {
        path: path.to_path_buf(),
        source: e,
    })
}
