use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Error, Result};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

const STAGING_PREFIX: &str = ".kikoeru-staging-";

/// Hidden scratch directory created next to the uploads it works on.
///
/// Living inside the working directory keeps every later move a same-device
/// rename. The directory is removed on drop unless [`Staging::persist`] was
/// called.
#[derive(Debug)]
pub struct Staging {
    root: PathBuf,
    persisted: bool,
}

impl Staging {
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let name = format!(
            "{STAGING_PREFIX}{}-{}",
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let root = crate::unique_destination(parent, &name);

        std::fs::create_dir_all(&root).map_err(|e| Error::Write {
            path: root.clone(),
            source: e,
        })?;

        Ok(Self {
            root,
            persisted: false,
        })
    }

    /// Whether `name` looks like a staging directory created by this type.
    pub fn is_staging_name(name: &str) -> bool {
        name.starts_with(STAGING_PREFIX)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty subdirectory for one extraction.
    pub fn create_dir(&self, label: &str) -> Result<PathBuf> {
        let dir = crate::unique_destination(&self.root, label);
        std::fs::create_dir(&dir).map_err(|e| Error::Write {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// Keep the directory on disk and hand back its path.
    pub fn persist(mut self) -> PathBuf {
        self.persisted = true;
        self.root.clone()
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.persisted && self.root.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to clean staging directory");
            }
        }
    }
}
