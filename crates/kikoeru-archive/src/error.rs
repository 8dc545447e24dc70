use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("zip-slip attack detected: entry '{entry}' resolves to '{resolved}'")]
    ZipSlip { entry: PathBuf, resolved: PathBuf },

    #[error("entry path is empty or contains a null byte")]
    InvalidPath,

    #[error("archive is corrupted")]
    Corrupted,

    #[error("archive is encrypted and no password was supplied")]
    PasswordRequired,

    #[error("archive rejected the supplied password")]
    WrongPassword,

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("{tool} failed (status {status:?}): {stderr}")]
    ExternalTool {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True when the failure is about the password rather than the archive itself.
    pub fn is_password_error(&self) -> bool {
        matches!(self, Self::PasswordRequired | Self::WrongPassword)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
