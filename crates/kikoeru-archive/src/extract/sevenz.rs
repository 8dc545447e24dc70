use std::fs::File;
use std::path::{Path, PathBuf};

use sevenz_rust::{Password, SevenZReader};
use tracing::debug;

use super::Extracted;
use crate::error::{Error, Result};
use crate::sanitize::sanitize_path;

pub(super) fn extract(archive: &Path, destination: &Path, password: Option<&str>) -> Result<Extracted> {
    let open_failed = |e| Error::ExtractionFailed {
        path: archive.to_path_buf(),
        source: e,
    };
    let file = File::open(archive).map_err(open_failed)?;
    let len = file.metadata().map_err(open_failed)?.len();
    let password = password.map(Password::from).unwrap_or_else(Password::empty);

    let mut reader = SevenZReader::new(file, len, password).map_err(map_sevenz_error)?;
    let mut extracted = Extracted::default();
    // The callback can only return sevenz errors, so ours are parked here.
    let mut failure: Option<Error> = None;

    reader
        .for_each_entries(|entry, data| {
            let step = sanitize_path(PathBuf::from(entry.name()), destination).and_then(|path| {
                if entry.is_directory() {
                    extracted.directory(path)
                } else {
                    extracted.file(path, data)
                }
            });
            match step {
                Ok(()) => Ok(true),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        })
        .map_err(map_sevenz_error)?;

    match failure {
        Some(e) => Err(e),
        None => Ok(extracted),
    }
}

fn map_sevenz_error(error: sevenz_rust::Error) -> Error {
    match error {
        sevenz_rust::Error::PasswordRequired => Error::PasswordRequired,
        sevenz_rust::Error::MaybeBadPassword(_) => Error::WrongPassword,
        other => {
            debug!(error = ?other, "7z archive rejected");
            Error::Corrupted
        }
    }
}
