use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::warn;
use zip::result::ZipError;

use super::Extracted;
use crate::error::{Error, Result};
use crate::sanitize::sanitize_path;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub(super) fn extract(archive: &Path, destination: &Path, password: Option<&str>) -> Result<Extracted> {
    let file = File::open(archive).map_err(|e| Error::ExtractionFailed {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(map_zip_error)?;
    let mut extracted = Extracted::default();

    for index in 0..zip.len() {
        let mut file = match password {
            Some(password) => zip.by_index_decrypt(index, password.as_bytes()),
            None => zip.by_index(index),
        }
        .map_err(map_zip_error)?;

        if file.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            warn!(archive = %archive.display(), entry = file.name(), "skipping symlink entry");
            continue;
        }

        let sanitized = sanitize_path(PathBuf::from(file.name()), destination)?;
        if file.is_dir() {
            extracted.directory(sanitized)?;
        } else {
            extracted.file(sanitized, &mut file)?;
        }
    }

    Ok(extracted)
}

fn map_zip_error(error: ZipError) -> Error {
    match error {
        ZipError::InvalidPassword => Error::WrongPassword,
        ZipError::UnsupportedArchive(message) if message == ZipError::PASSWORD_REQUIRED => {
            Error::PasswordRequired
        }
        ZipError::Io(e) => Error::Io(e),
        _ => Error::Corrupted,
    }
}
