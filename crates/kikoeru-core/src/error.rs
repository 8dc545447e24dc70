use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to extract '{archive}' at depth {depth}: {source}")]
    Extraction {
        archive: PathBuf,
        depth: usize,
        source: kikoeru_archive::Error,
    },

    #[error("'{archive}' nests archives deeper than {depth} levels")]
    NestingTooDeep { archive: PathBuf, depth: usize },

    #[error("not an archive: {0}")]
    NotAnArchive(PathBuf),

    #[error(transparent)]
    Fs(#[from] kikoeru_fs::Error),

    #[error("i/o error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] figment::Error),
}

impl Error {
    /// Nesting level the failure happened at, when it is tied to one.
    pub fn depth(&self) -> Option<usize> {
        match self {
            Self::Extraction { depth, .. } | Self::NestingTooDeep { depth, .. } => Some(*depth),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
